//! Error types for the settings crate.

use std::io;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be loaded.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// The settings file could not be saved.
    #[error("Failed to save settings: {0}")]
    SaveError(String),

    /// A settings value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// The PascalCase setting name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The store has no backing file.
    #[error("Settings store has no backing file")]
    NoBackingFile,

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SettingsError {
    /// Convenience constructor for validation failures
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        SettingsError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
