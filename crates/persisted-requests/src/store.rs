//! The persisted request list.
//!
//! Holds the ordered pending requests and, separately, the one request the
//! queue is currently sending. The in-flight request is never visible to
//! conflict resolvers and is never touched by `push_request`.

use crate::writer::{PersistJob, PersistWriter};
use crate::{KeyValueStorage, StoreError, StoreResult};
use parking_lot::Mutex;
use queue_protocol_types::{ConflictDecision, PersistedRequest, Request};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Storage key for the pending list.
pub const PERSISTED_REQUESTS_KEY: &str = "persistedRequests";

/// Storage key for the in-flight request.
pub const PERSISTED_ONGOING_REQUEST_KEY: &str = "persistedOngoingRequest";

#[derive(Default)]
struct StoreState {
    pending: Vec<Request>,
    ongoing: Option<Request>,
}

/// Ordered, durable list of pending requests.
pub struct PersistedRequests {
    state: Mutex<StoreState>,
    writer: PersistWriter,
}

impl PersistedRequests {
    /// Create an empty store. Does not read storage.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            writer: PersistWriter::spawn(storage),
        }
    }

    /// Create a store initialized from whatever `storage` holds.
    ///
    /// A request that was in flight when the process stopped goes back to the
    /// head of the list so it is sent again first.
    pub async fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let mut pending = read_list(storage.as_ref()).await;
        let ongoing = read_ongoing(storage.as_ref()).await;

        let recovered = match ongoing {
            Some(request) if !pending.iter().any(|r| r.is_same_entry(&request)) => {
                info!(request_id = %request.id, command = %request.command, "Recovered in-flight request");
                pending.insert(0, request);
                true
            }
            Some(_) => true,
            None => false,
        };

        info!(count = pending.len(), "Loaded persisted requests");

        let store = Self::new(storage);
        {
            let mut state = store.state.lock();
            state.pending = pending;
            if recovered {
                store.persist_pending(&state);
                store.persist_ongoing(&state);
            }
        }
        store
    }

    /// Snapshot of the pending requests, in order. Excludes the in-flight one.
    pub fn get_all(&self) -> Vec<Request> {
        self.state.lock().pending.clone()
    }

    /// Number of requests not yet finished, counting the in-flight one.
    pub fn length(&self) -> usize {
        let state = self.state.lock();
        state.pending.len() + usize::from(state.ongoing.is_some())
    }

    /// Replace the whole pending list.
    pub fn save(&self, requests: Vec<Request>) {
        let mut state = self.state.lock();
        state.pending = requests;
        self.persist_pending(&state);
    }

    /// Add a request, letting its resolver decide against the pending list.
    ///
    /// The resolver runs under the store lock, so the list it sees is exactly
    /// the list the decision is applied to.
    pub fn push_request(&self, request: Request) -> StoreResult<ConflictDecision> {
        let mut state = self.state.lock();
        let decision = request.resolve_conflict(&state.pending);

        match decision {
            ConflictDecision::Push => {
                debug!(request_id = %request.id, command = %request.command, "Pushing request");
                state.pending.push(request);
            }
            ConflictDecision::Replace { index } => {
                let len = state.pending.len();
                if index >= len {
                    error!(
                        request_id = %request.id,
                        command = %request.command,
                        index,
                        len,
                        "Conflict resolver returned an out of range index"
                    );
                    return Err(StoreError::IndexOutOfRange { index, len });
                }
                debug!(
                    request_id = %request.id,
                    replaced = %state.pending[index].id,
                    index,
                    "Replacing pending request"
                );
                state.pending[index] = request;
            }
            ConflictDecision::NoAction => {
                debug!(request_id = %request.id, command = %request.command, "Request dropped by resolver");
                return Ok(decision);
            }
        }

        self.persist_pending(&state);
        Ok(decision)
    }

    /// Overwrite the pending request at `index`.
    pub fn update(&self, index: usize, request: Request) -> StoreResult<()> {
        let mut state = self.state.lock();
        let len = state.pending.len();
        let slot = state
            .pending
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        *slot = request;
        self.persist_pending(&state);
        Ok(())
    }

    /// Remove exactly one entry matching `request` by identity.
    ///
    /// Looks in the pending list first, then the in-flight slot.
    pub fn remove(&self, request: &Request) -> bool {
        let mut state = self.state.lock();
        if let Some(pos) = state.pending.iter().position(|r| r.is_same_entry(request)) {
            state.pending.remove(pos);
            self.persist_pending(&state);
            return true;
        }
        if state
            .ongoing
            .as_ref()
            .is_some_and(|ongoing| ongoing.is_same_entry(request))
        {
            state.ongoing = None;
            self.persist_ongoing(&state);
            return true;
        }
        false
    }

    /// Drop every pending request and the in-flight slot.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.ongoing = None;
        self.persist_pending(&state);
        self.persist_ongoing(&state);
    }

    /// Move the head of the list into the in-flight slot and return it.
    ///
    /// If a request is already in flight it is returned unchanged.
    pub fn process_next_request(&self) -> Option<Request> {
        let mut state = self.state.lock();
        if let Some(ongoing) = &state.ongoing {
            return Some(ongoing.clone());
        }
        if state.pending.is_empty() {
            return None;
        }
        let next = state.pending.remove(0);
        state.ongoing = Some(next.clone());
        self.persist_pending(&state);
        self.persist_ongoing(&state);
        Some(next)
    }

    /// Put the in-flight request back at the head of the list.
    pub fn rollback_ongoing_request(&self) -> bool {
        let mut state = self.state.lock();
        let Some(ongoing) = state.ongoing.take() else {
            return false;
        };
        debug!(request_id = %ongoing.id, "Rolling back in-flight request");
        state.pending.insert(0, ongoing);
        self.persist_pending(&state);
        self.persist_ongoing(&state);
        true
    }

    /// Finish the in-flight request. Falls back to the pending list when
    /// `request` is not the one in flight.
    pub fn end_request_and_remove_from_queue(&self, request: &Request) -> bool {
        let mut state = self.state.lock();
        if state
            .ongoing
            .as_ref()
            .is_some_and(|ongoing| ongoing.is_same_entry(request))
        {
            state.ongoing = None;
            self.persist_ongoing(&state);
            return true;
        }
        drop(state);
        self.remove(request)
    }

    /// The request currently being sent, if any.
    pub fn get_ongoing_request(&self) -> Option<Request> {
        self.state.lock().ongoing.clone()
    }

    /// Wait until every mutation made so far has reached storage (or failed to).
    pub async fn wait_for_persistence(&self) {
        self.writer.flush().await;
    }

    fn persist_pending(&self, state: &StoreState) {
        let snapshot: Vec<PersistedRequest> =
            state.pending.iter().map(PersistedRequest::from).collect();
        match serde_json::to_string(&snapshot) {
            Ok(value) => self.writer.submit(PersistJob::Write {
                key: PERSISTED_REQUESTS_KEY,
                value,
            }),
            Err(e) => warn!(error = %e, "Failed to serialize pending requests"),
        }
    }

    fn persist_ongoing(&self, state: &StoreState) {
        let Some(ongoing) = &state.ongoing else {
            self.writer.submit(PersistJob::Remove {
                key: PERSISTED_ONGOING_REQUEST_KEY,
            });
            return;
        };
        match serde_json::to_string(&PersistedRequest::from(ongoing)) {
            Ok(value) => self.writer.submit(PersistJob::Write {
                key: PERSISTED_ONGOING_REQUEST_KEY,
                value,
            }),
            Err(e) => warn!(error = %e, "Failed to serialize in-flight request"),
        }
    }
}

async fn read_raw(storage: &dyn KeyValueStorage, key: &str) -> Option<String> {
    match storage.read(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted value, starting empty");
            None
        }
    }
}

async fn read_list(storage: &dyn KeyValueStorage) -> Vec<Request> {
    let Some(raw) = read_raw(storage, PERSISTED_REQUESTS_KEY).await else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<PersistedRequest>>(&raw) {
        Ok(list) => list.into_iter().map(Request::from).collect(),
        Err(e) => {
            warn!(key = PERSISTED_REQUESTS_KEY, error = %e, "Corrupt persisted requests, starting empty");
            Vec::new()
        }
    }
}

async fn read_ongoing(storage: &dyn KeyValueStorage) -> Option<Request> {
    let raw = read_raw(storage, PERSISTED_ONGOING_REQUEST_KEY).await?;
    match serde_json::from_str::<Option<PersistedRequest>>(&raw) {
        Ok(request) => request.map(Request::from),
        Err(e) => {
            warn!(key = PERSISTED_ONGOING_REQUEST_KEY, error = %e, "Corrupt in-flight request, ignoring");
            None
        }
    }
}
