//! Common error types for scroblog operations

use thiserror::Error;

/// Common result type for scroblog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every scroblog component
#[derive(Error, Debug)]
pub enum Error {
    /// A required structural element (column or key) is missing or has the wrong shape
    #[error("Schema violation: {0}")]
    Schema(String),

    /// A value is structurally present but semantically invalid
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A caller-supplied parameter is outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An attempted mutation violates an aggregate-level rule
    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV processing error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
