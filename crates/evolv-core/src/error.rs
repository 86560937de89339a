//! Unified error types for Evolv

use thiserror::Error;

/// Unified error type for all Evolv operations
///
/// Unknown ids are not errors: lookups return `Ok(None)` or a not-found
/// result variant instead.
#[derive(Error, Debug)]
pub enum EvolvError {
    // Input errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    // Wiring errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Collaborator errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Evolution strategy error: {0}")]
    Strategy(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl EvolvError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type alias using EvolvError
pub type Result<T> = std::result::Result<T, EvolvError>;
