//! Error types for Lethe

use thiserror::Error;

/// Main error type for Lethe operations
#[derive(Error, Debug)]
pub enum LetheError {
    /// Unknown memory id
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Storage-related errors (LanceDB, malformed rows, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing or invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LetheError {
    /// Whether this error is a missing-record error
    pub fn is_not_found(&self) -> bool {
        matches!(self, LetheError::NotFound(_))
    }
}

/// Result type alias for Lethe operations
pub type Result<T> = std::result::Result<T, LetheError>;
