//! Conflict resolution protocol.

use crate::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a new request is placed relative to the requests already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConflictDecision {
    /// Append the new request at the tail.
    Push,
    /// Overwrite the waiting request at `index` with the new one.
    Replace { index: usize },
    /// Drop the new request; nothing waiting changes.
    NoAction,
}

/// Per-request merge policy.
///
/// Invoked with the waiting requests (never the in-flight one, never the
/// candidate itself) in execution order. Must be pure and must not call back
/// into the queue.
pub type ConflictResolver = Arc<dyn Fn(&[Request]) -> ConflictDecision + Send + Sync>;

impl ConflictDecision {
    /// Resolver that collapses every waiting request with the same command
    /// into the newest one, pushing when none is waiting.
    pub fn replace_same_command(command: impl Into<String>) -> ConflictResolver {
        let command = command.into();
        Arc::new(move |pending: &[Request]| {
            match pending.iter().position(|r| r.command == command) {
                Some(index) => ConflictDecision::Replace { index },
                None => ConflictDecision::Push,
            }
        })
    }

    /// Resolver that drops the new request when one with the same command is
    /// already waiting.
    pub fn skip_if_pending(command: impl Into<String>) -> ConflictResolver {
        let command = command.into();
        Arc::new(move |pending: &[Request]| {
            if pending.iter().any(|r| r.command == command) {
                ConflictDecision::NoAction
            } else {
                ConflictDecision::Push
            }
        })
    }
}
