//! Settings persistence layer
//!
//! Settings are stored as versioned JSON. Loading validates both the version
//! and the values before handing them to a model.

use crate::{ModelSettings, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serializable container for model settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Version of the settings format
    pub version: u32,
    #[serde(default)]
    pub settings: ModelSettings,
}

impl SettingsFile {
    /// Current version of the settings format
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(settings: ModelSettings) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            settings,
        }
    }

    /// Serializes to pretty JSON
    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::SerializationFailed(e.to_string()))
    }

    /// Deserializes from JSON, checking version and values
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let file: SettingsFile = serde_json::from_str(text)
            .map_err(|e| SettingsError::DeserializationFailed(e.to_string()))?;
        if file.version != Self::CURRENT_VERSION {
            return Err(SettingsError::UnsupportedVersion(file.version));
        }
        file.settings.validate()?;
        Ok(file)
    }

    /// Reads a settings file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| SettingsError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Writes this settings file to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let text = self.to_json()?;
        std::fs::write(path, text).map_err(|e| SettingsError::Io(e.to_string()))
    }
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self::new(ModelSettings::default())
    }
}

/// Attempts to load settings from JSON, falling back to defaults on error
pub fn load_settings_safe(text: &str) -> ModelSettings {
    SettingsFile::from_json(text)
        .map(|file| file.settings)
        .unwrap_or_default()
}
