//! Queue error types.

use persisted_requests::StoreError;
use thiserror::Error;

/// Queue error type.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A conflict resolver addressed a pending request that does not exist
    #[error("Conflict resolver returned index {index} but only {len} requests are pending")]
    ConflictIndexOutOfRange { index: usize, len: usize },

    /// Store error
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IndexOutOfRange { index, len } => {
                QueueError::ConflictIndexOutOfRange { index, len }
            }
            other => QueueError::Store(other),
        }
    }
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
