//! Network executor port.

use async_trait::async_trait;
use queue_protocol_types::{Request, StateUpdate};
use std::time::Duration;
use thiserror::Error;

/// Successful response from the remote side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestResponse {
    /// Raw response body.
    pub payload: serde_json::Value,
    /// Server-supplied state updates, applied before the request's own
    /// success data.
    pub updates: Vec<StateUpdate>,
}

impl RequestResponse {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            updates: Vec::new(),
        }
    }

    pub fn with_updates(mut self, updates: Vec<StateUpdate>) -> Self {
        self.updates = updates;
        self
    }
}

/// Why a send did not succeed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Timeout, 5xx, or another failure worth retrying
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Connectivity is gone; the queue pauses until reconnect
    #[error("Offline: {0}")]
    Offline(String),

    /// The server asked us to slow down
    #[error("Rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// Semantic rejection; retrying will not help
    #[error("Terminal failure: {0}")]
    Terminal(String),
}

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Success(RequestResponse),
    Failure(FailureKind),
}

impl RequestOutcome {
    pub fn success() -> Self {
        RequestOutcome::Success(RequestResponse::default())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        RequestOutcome::Failure(FailureKind::Transient(message.into()))
    }

    pub fn offline(message: impl Into<String>) -> Self {
        RequestOutcome::Failure(FailureKind::Offline(message.into()))
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        RequestOutcome::Failure(FailureKind::Terminal(message.into()))
    }
}

/// Sends one request and classifies the result.
///
/// Implementations own timeouts; the queue never cancels a send.
#[async_trait]
pub trait NetworkExecutor: Send + Sync {
    async fn send(&self, request: &Request) -> RequestOutcome;
}
