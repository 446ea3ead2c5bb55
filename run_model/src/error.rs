//! Model error types

use core_types::Pointer;
use rom_store::StoreError;
use run_format::FormatError;
use thiserror::Error;

/// Errors raised by the run registry and the data model.
///
/// A failed call leaves the registry as it was; bytes already recorded in
/// the caller's delta can be rolled back with `History::discard_current`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Run at {start:06X} (length {length}) overlaps the run at {existing:06X}")]
    Overlap {
        start: usize,
        length: usize,
        existing: usize,
    },

    #[error("No run starts at {address:06X}")]
    NotFound { address: usize },

    #[error("Anchor name '{name}' is already used at {address:06X}")]
    NameInUse { name: String, address: usize },

    #[error("'{name}' is not a valid anchor name")]
    InvalidName { name: String },

    #[error("No anchor named '{name}'")]
    UnknownAnchor { name: String },

    #[error("'{text}' is not a reachable address or a known anchor")]
    InvalidAddress { text: String },

    #[error("Range {address:06X}+{length} is outside the data (length {data_length})")]
    OutOfBounds {
        address: usize,
        length: usize,
        data_length: usize,
    },

    #[error("No terminator found after {address:06X}")]
    TerminatorNotFound { address: usize },

    #[error("Run at {address:06X} is not a {expected}")]
    WrongRunKind {
        address: usize,
        expected: &'static str,
    },

    #[error("Table at {address:06X} has no field '{field}'")]
    UnknownField { address: usize, field: String },

    #[error("Element {index} is past the end of the table at {address:06X} ({count} elements)")]
    ElementOutOfRange {
        address: usize,
        index: usize,
        count: usize,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ModelError {
    pub(crate) fn out_of_bounds(address: usize, length: usize, data_length: usize) -> Self {
        ModelError::OutOfBounds {
            address,
            length,
            data_length,
        }
    }

    /// A pointer whose target has no stored form
    pub(crate) fn unencodable(pointer: Pointer) -> Self {
        ModelError::InvalidAddress {
            text: pointer.to_string(),
        }
    }
}
