//! Format error types

use thiserror::Error;

/// Errors raised while parsing formats or encoding field values.
///
/// Every variant names the token, field or value at fault.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Cannot parse '{token}': {reason}")]
    Parse { token: String, reason: String },

    #[error("Tuple '{tuple}' needs {bits} bits but only holds {capacity}")]
    BitOverflow {
        tuple: String,
        bits: u32,
        capacity: u32,
    },

    #[error("Count field '/{field}' does not name a field of the enclosing element")]
    UnknownCountField { field: String },

    #[error("List '{list}' used by '{segment}' could not be resolved")]
    UnresolvedList { segment: String, list: String },

    #[error("Value {value} does not fit in '{field}' ({bits} bits)")]
    ValueOutOfRange { field: String, value: u64, bits: u32 },

    #[error("'{text}' is not a valid value for '{field}'")]
    InvalidValue { field: String, text: String },

    #[error("'{text}' is not a reachable address or a known anchor")]
    InvalidAddress { text: String },
}

impl FormatError {
    pub(crate) fn parse(token: &str, reason: impl Into<String>) -> Self {
        FormatError::Parse {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(field: &str, text: &str) -> Self {
        FormatError::InvalidValue {
            field: field.to_string(),
            text: text.to_string(),
        }
    }
}
