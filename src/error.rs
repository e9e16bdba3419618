//! Error types for Ratewarden.

use thiserror::Error;

/// Main error type for Ratewarden operations.
///
/// Admission checks never produce one of these; they only surface while
/// building a limiter or loading configuration.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Configuration-related errors, including rejected quotas
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for WardenError {
    fn from(err: config::ConfigError) -> Self {
        WardenError::Config(err.to_string())
    }
}

/// Result type alias for Ratewarden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
