//! Response classification.

use queue_protocol_types::StateUpdate;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use sequential_queue::{FailureKind, RequestResponse};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Classify a non-success HTTP status.
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> FailureKind {
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited {
            retry_after,
            message,
        },
        StatusCode::REQUEST_TIMEOUT => FailureKind::Transient(message),
        s if s.is_server_error() => FailureKind::Transient(message),
        _ => FailureKind::Terminal(message),
    }
}

/// Read `Retry-After` as delta seconds. HTTP dates are not supported.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Build the success response from a body. Non-JSON bodies are kept as a
/// string payload; a malformed `updates` array is ignored.
pub fn parse_success_body(body: &str) -> RequestResponse {
    if body.trim().is_empty() {
        return RequestResponse::new(Value::Null);
    }

    let payload = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => return RequestResponse::new(Value::String(body.to_string())),
    };

    let updates = match payload.get("updates") {
        Some(raw) => match serde_json::from_value::<Vec<StateUpdate>>(raw.clone()) {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed updates in response");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    RequestResponse::new(payload).with_updates(updates)
}
