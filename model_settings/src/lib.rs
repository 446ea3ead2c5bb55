//! # Model Settings
//!
//! Typed configuration for the structured ROM model and the diff engine.
//!
//! ## Philosophy
//!
//! - **Typed settings**: every policy constant is a named, typed field
//! - **Documented defaults**: `ModelSettings::default()` is the baseline,
//!   persisted files only carry what the user changed
//! - **Validated**: nonsensical values are rejected before any model uses them
//!
//! ## Example
//!
//! ```
//! use model_settings::ModelSettings;
//!
//! let mut settings = ModelSettings::default();
//! settings.diff.max_segments = 2;
//! assert!(settings.validate().is_ok());
//! assert_eq!(settings.filler_byte, 0xFF);
//! ```

pub mod persistence;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use persistence::{load_settings_safe, SettingsFile};

/// Errors raised by validation and persistence
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Unsupported settings version: {0}")]
    UnsupportedVersion(u32),

    #[error("Failed to serialize settings: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize settings: {0}")]
    DeserializationFailed(String),

    #[error("Settings I/O error: {0}")]
    Io(String),
}

/// Policy for the diff engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSettings {
    /// Most segments a single diff reports (`MaximumDiffSegments`)
    pub max_segments: usize,
    /// Runs of identical bytes shorter than this are bridged into one segment
    pub merge_threshold: usize,
    /// Rows kept visible after the last differing row of a segment
    pub context_rows: usize,
    /// Widest column count either side of a diff view may use
    pub max_view_width: usize,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self {
            max_segments: 1000,
            merge_threshold: 4,
            context_rows: 2,
            max_view_width: 32,
        }
    }
}

/// Settings for one loaded byte store and its run model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Byte value that marks free space
    pub filler_byte: u8,
    /// First address the repointer searches for free space
    pub free_space_start: usize,
    /// Relocated runs start on a multiple of this
    pub free_space_alignment: usize,
    /// Number of committed changes the history keeps
    pub history_capacity: usize,
    pub diff: DiffSettings,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            filler_byte: 0xFF,
            free_space_start: 0,
            free_space_alignment: 4,
            history_capacity: 100,
            diff: DiffSettings::default(),
        }
    }
}

impl ModelSettings {
    /// Checks that every value is usable
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.free_space_alignment == 0 {
            return Err(invalid("free_space_alignment", "must be at least 1"));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be at least 1"));
        }
        if self.diff.merge_threshold == 0 {
            return Err(invalid("diff.merge_threshold", "must be at least 1"));
        }
        if self.diff.max_view_width == 0 {
            return Err(invalid("diff.max_view_width", "must be at least 1"));
        }
        Ok(())
    }

    /// Rounds `address` up to the relocation alignment
    pub fn align(&self, address: usize) -> usize {
        let alignment = self.free_space_alignment.max(1);
        address.div_ceil(alignment) * alignment
    }
}

fn invalid(key: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.to_string(),
    }
}
