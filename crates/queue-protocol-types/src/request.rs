//! The request record: one unit of deferred work.

use crate::{ConflictDecision, ConflictResolver, StateUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque request payload, owned by the caller.
pub type RequestData = serde_json::Map<String, serde_json::Value>;

/// Stable identity of a request. Removal is by identity, never by payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A queued write-request.
///
/// Cloning is cheap for the resolver (shared `Arc`) and keeps the same
/// [`RequestId`], so a clone still identifies the same queue entry.
#[derive(Clone)]
pub struct Request {
    pub id: RequestId,
    pub command: String,
    pub data: RequestData,
    pub success_data: Vec<StateUpdate>,
    pub failure_data: Vec<StateUpdate>,
    pub created_at: DateTime<Utc>,
    pub conflict_resolver: Option<ConflictResolver>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            command: command.into(),
            data: RequestData::new(),
            success_data: Vec::new(),
            failure_data: Vec::new(),
            created_at: Utc::now(),
            conflict_resolver: None,
        }
    }

    pub fn with_data(mut self, data: RequestData) -> Self {
        self.data = data;
        self
    }

    /// Set the payload from a JSON value. Non-object values are ignored.
    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = value {
            self.data = map;
        }
        self
    }

    pub fn with_success_data(mut self, updates: Vec<StateUpdate>) -> Self {
        self.success_data = updates;
        self
    }

    pub fn with_failure_data(mut self, updates: Vec<StateUpdate>) -> Self {
        self.failure_data = updates;
        self
    }

    pub fn with_conflict_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&[Request]) -> ConflictDecision + Send + Sync + 'static,
    {
        self.conflict_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_shared_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.conflict_resolver = Some(resolver);
        self
    }

    /// Run this request's resolver against the waiting requests.
    /// Requests without a resolver always push.
    pub fn resolve_conflict(&self, pending: &[Request]) -> ConflictDecision {
        match &self.conflict_resolver {
            Some(resolver) => resolver(pending),
            None => ConflictDecision::Push,
        }
    }

    /// Whether `other` is the same queue entry.
    pub fn is_same_entry(&self, other: &Request) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("data", &self.data)
            .field("success_data", &self.success_data)
            .field("failure_data", &self.failure_data)
            .field("created_at", &self.created_at)
            .field("has_conflict_resolver", &self.conflict_resolver.is_some())
            .finish()
    }
}

/// Storage form of a [`Request`]. Resolvers are code, so they do not survive
/// a restart; recovered requests are replayed as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRequest {
    pub id: RequestId,
    pub command: String,
    #[serde(default)]
    pub data: RequestData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_data: Vec<StateUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_data: Vec<StateUpdate>,
    pub created_at: DateTime<Utc>,
}

impl From<&Request> for PersistedRequest {
    fn from(request: &Request) -> Self {
        Self {
            id: request.id,
            command: request.command.clone(),
            data: request.data.clone(),
            success_data: request.success_data.clone(),
            failure_data: request.failure_data.clone(),
            created_at: request.created_at,
        }
    }
}

impl From<PersistedRequest> for Request {
    fn from(persisted: PersistedRequest) -> Self {
        Self {
            id: persisted.id,
            command: persisted.command,
            data: persisted.data,
            success_data: persisted.success_data,
            failure_data: persisted.failure_data,
            created_at: persisted.created_at,
            conflict_resolver: None,
        }
    }
}
