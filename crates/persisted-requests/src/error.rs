//! Store error types.

use thiserror::Error;

/// Request store error type.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] queue_database::DatabaseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage backend refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A conflict resolver or caller addressed a position that does not exist
    #[error("Index {index} is out of range for {len} pending requests")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
