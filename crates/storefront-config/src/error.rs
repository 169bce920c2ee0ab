//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for loading, validating and saving configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting parsed but cannot be used
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    /// An explicitly requested config file does not exist
    #[error("Config file not found: {}", .0.display())]
    MissingConfigFile(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Home directory could not be resolved
    #[error("Path error: {0}")]
    Path(String),
}

impl CoreError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
