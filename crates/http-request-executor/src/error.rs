//! Executor error types.

use thiserror::Error;

/// Errors raised while building the executor. Send failures are never
/// errors; they are classified into `FailureKind`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API base URL did not parse
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using ExecutorError.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
