//! The queue orchestrator.
//!
//! One worker task drains the store head first. The control state lives in a
//! `watch` channel so transitions are atomic and observable: the worker decides
//! "take the next head or go idle" under the same lock `push` uses to decide
//! "start a worker", so a push can never be stranded in an idle queue.

use crate::{
    FailureKind, LocalState, NetworkExecutor, QueueResult, RequestOutcome, RetryPolicy,
};
use parking_lot::Mutex;
use persisted_requests::PersistedRequests;
use queue_protocol_types::{ConflictDecision, Request, RequestId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Control state of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum QueueState {
    /// No worker is running and nothing is in flight.
    Idle,
    /// The worker is sending or about to take the next head.
    Processing,
    /// No new sends start. `draining` is true while the worker is still
    /// finishing a send that started before the pause.
    Paused { draining: bool },
}

impl QueueState {
    pub fn is_paused(&self) -> bool {
        matches!(self, QueueState::Paused { .. })
    }

    /// No worker is running.
    fn is_settled(&self) -> bool {
        matches!(
            self,
            QueueState::Idle | QueueState::Paused { draining: false }
        )
    }
}

/// Consecutive failures of the current head.
#[derive(Default)]
struct RetryTracker {
    request_id: Option<RequestId>,
    failures: u32,
}

impl RetryTracker {
    fn record_failure(&mut self, id: RequestId) -> u32 {
        if self.request_id != Some(id) {
            self.request_id = Some(id);
            self.failures = 0;
        }
        self.failures += 1;
        self.failures
    }

    /// 1-based number of the next send of `id`.
    fn attempt_for(&self, id: RequestId) -> u32 {
        if self.request_id == Some(id) {
            self.failures + 1
        } else {
            1
        }
    }

    fn reset(&mut self) {
        self.request_id = None;
        self.failures = 0;
    }
}

struct Inner {
    store: Arc<PersistedRequests>,
    executor: Arc<dyn NetworkExecutor>,
    local_state: Arc<dyn LocalState>,
    retry: RetryPolicy,
    state: watch::Sender<QueueState>,
    retries: Mutex<RetryTracker>,
}

/// FIFO queue that sends one request at a time.
///
/// Cheap to clone; all clones drive the same queue. `push`, `flush` and
/// `unpause` may start a worker with `tokio::spawn`, so they must be called
/// from within a Tokio runtime.
#[derive(Clone)]
pub struct SequentialQueue {
    inner: Arc<Inner>,
}

impl SequentialQueue {
    pub fn new(
        store: Arc<PersistedRequests>,
        executor: Arc<dyn NetworkExecutor>,
        local_state: Arc<dyn LocalState>,
        retry: RetryPolicy,
    ) -> Self {
        let (state, _) = watch::channel(QueueState::Idle);
        Self {
            inner: Arc::new(Inner {
                store,
                executor,
                local_state,
                retry,
                state,
                retries: Mutex::new(RetryTracker::default()),
            }),
        }
    }

    /// Add a request and start processing if the queue is idle.
    ///
    /// The request's resolver runs against the waiting requests only; the
    /// one in flight is never visible to it. Returns once the store has been
    /// updated. Sending happens in the background.
    pub fn push(&self, request: Request) -> QueueResult<ConflictDecision> {
        let request_id = request.id;
        let command = request.command.clone();

        let decision = self.inner.store.push_request(request)?;
        debug!(request_id = %request_id, command = %command, ?decision, "Request queued");

        if decision != ConflictDecision::NoAction {
            self.start_if_idle();
        }
        Ok(decision)
    }

    /// Start processing whatever is pending, unless paused.
    pub fn flush(&self) {
        if self.inner.store.length() > 0 {
            self.start_if_idle();
        }
    }

    /// Stop starting new sends. A send already in flight completes and its
    /// side effects are applied.
    pub fn pause(&self) {
        self.inner.state.send_if_modified(|state| match *state {
            QueueState::Processing => {
                *state = QueueState::Paused { draining: true };
                true
            }
            QueueState::Idle => {
                *state = QueueState::Paused { draining: false };
                true
            }
            QueueState::Paused { .. } => false,
        });
        info!("Queue paused");
    }

    /// Resume from the current head.
    pub fn unpause(&self) {
        let mut spawn = false;
        self.inner.state.send_if_modified(|state| match *state {
            // The worker has not exited yet; it picks up where it left off.
            QueueState::Paused { draining: true } => {
                *state = QueueState::Processing;
                true
            }
            QueueState::Paused { draining: false } => {
                spawn = true;
                *state = QueueState::Processing;
                true
            }
            _ => false,
        });
        info!("Queue unpaused");
        if spawn {
            self.spawn_worker();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    /// Whether a worker is currently running.
    pub fn is_running(&self) -> bool {
        !self.state().is_settled()
    }

    pub fn state(&self) -> QueueState {
        *self.inner.state.borrow()
    }

    /// Number of unfinished requests, counting the one in flight.
    pub fn length(&self) -> usize {
        self.inner.store.length()
    }

    /// Waiting requests in send order, excluding the one in flight.
    pub fn get_all(&self) -> Vec<Request> {
        self.inner.store.get_all()
    }

    /// The request currently being sent, if any.
    pub fn ongoing_request(&self) -> Option<Request> {
        self.inner.store.get_ongoing_request()
    }

    /// Wait until no worker is running and every store mutation has been
    /// written to storage.
    pub async fn wait_for_idle(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(QueueState::is_settled).await;
        self.wait_for_persistence().await;
    }

    /// Wait for every store mutation made so far to reach storage, without
    /// waiting for the worker.
    pub async fn wait_for_persistence(&self) {
        self.inner.store.wait_for_persistence().await;
    }

    fn start_if_idle(&self) {
        let started = self.inner.state.send_if_modified(|state| {
            if *state == QueueState::Idle {
                *state = QueueState::Processing;
                true
            } else {
                false
            }
        });
        if started {
            self.spawn_worker();
        }
    }

    fn spawn_worker(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            debug!("Queue worker started");
            inner.run().await;
            debug!("Queue worker stopped");
        });
    }
}

impl Inner {
    async fn run(&self) {
        while let Some(request) = self.take_next() {
            let attempt = self.retries.lock().attempt_for(request.id);
            let span = info_span!(
                "send",
                request_id = %request.id,
                command = %request.command,
                attempt
            );
            debug!(parent: &span, "Sending request");
            let outcome = self.executor.send(&request).instrument(span).await;
            match outcome {
                RequestOutcome::Success(response) => {
                    self.local_state.apply(&response.updates);
                    self.local_state.apply(&request.success_data);
                    self.store.end_request_and_remove_from_queue(&request);
                    self.retries.lock().reset();
                    info!(request_id = %request.id, command = %request.command, "Request succeeded");
                }
                RequestOutcome::Failure(FailureKind::Terminal(message)) => {
                    self.fail(&request, &message);
                }
                RequestOutcome::Failure(FailureKind::Offline(message)) => {
                    self.store.rollback_ongoing_request();
                    self.state.send_replace(QueueState::Paused { draining: false });
                    warn!(
                        request_id = %request.id,
                        command = %request.command,
                        error = %message,
                        "Offline, pausing queue until reconnect"
                    );
                    return;
                }
                RequestOutcome::Failure(FailureKind::Transient(message)) => {
                    self.retry_later(&request, None, &message).await;
                }
                RequestOutcome::Failure(FailureKind::RateLimited {
                    retry_after,
                    message,
                }) => {
                    self.retry_later(&request, retry_after, &message).await;
                }
            }
        }
    }

    /// Move the head into the in-flight slot, or settle the state when there
    /// is nothing to do.
    fn take_next(&self) -> Option<Request> {
        let mut next = None;
        self.state.send_if_modified(|state| match *state {
            QueueState::Paused { draining: true } => {
                *state = QueueState::Paused { draining: false };
                true
            }
            QueueState::Paused { draining: false } => false,
            QueueState::Idle | QueueState::Processing => {
                match self.store.process_next_request() {
                    Some(request) => {
                        next = Some(request);
                        let changed = *state != QueueState::Processing;
                        *state = QueueState::Processing;
                        changed
                    }
                    None => {
                        *state = QueueState::Idle;
                        true
                    }
                }
            }
        });
        next
    }

    fn fail(&self, request: &Request, message: &str) {
        self.local_state.apply(&request.failure_data);
        self.store.end_request_and_remove_from_queue(request);
        self.retries.lock().reset();
        error!(
            request_id = %request.id,
            command = %request.command,
            error = %message,
            "Request failed permanently"
        );
    }

    async fn retry_later(&self, request: &Request, retry_after: Option<Duration>, message: &str) {
        let failures = self.retries.lock().record_failure(request.id);
        if !self.retry.should_retry(failures) {
            self.fail(request, &format!("retries exhausted: {message}"));
            return;
        }

        let delay = retry_after.unwrap_or_else(|| self.retry.delay_for(failures));
        // Back in the waiting list so newer pushes can merge with it while we wait.
        self.store.rollback_ongoing_request();
        warn!(
            request_id = %request.id,
            command = %request.command,
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "Send failed, retrying"
        );

        let mut rx = self.state.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = rx.wait_for(QueueState::is_paused) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryLocalState, RequestResponse};
    use async_trait::async_trait;
    use persisted_requests::InMemoryStorage;
    use queue_protocol_types::StateUpdate;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays a fixed script of outcomes, then succeeds.
    struct ScriptedExecutor {
        script: Mutex<VecDeque<RequestOutcome>>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<RequestOutcome>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl NetworkExecutor for ScriptedExecutor {
        async fn send(&self, request: &Request) -> RequestOutcome {
            self.sent.lock().push(request.command.clone());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(RequestOutcome::success)
        }
    }

    fn queue_with(
        executor: Arc<ScriptedExecutor>,
        retry: RetryPolicy,
    ) -> (SequentialQueue, Arc<InMemoryLocalState>) {
        let store = Arc::new(PersistedRequests::new(Arc::new(InMemoryStorage::new())));
        let local_state = Arc::new(InMemoryLocalState::new());
        let queue = SequentialQueue::new(store, executor, local_state.clone(), retry);
        (queue, local_state)
    }

    #[test]
    fn retry_tracker_resets_on_new_head() {
        let mut tracker = RetryTracker::default();
        let a = RequestId::new();
        let b = RequestId::new();
        assert_eq!(tracker.attempt_for(a), 1);
        assert_eq!(tracker.record_failure(a), 1);
        assert_eq!(tracker.record_failure(a), 2);
        assert_eq!(tracker.attempt_for(a), 3);
        assert_eq!(tracker.attempt_for(b), 1);
        assert_eq!(tracker.record_failure(b), 1);
        tracker.reset();
        assert_eq!(tracker.record_failure(b), 1);
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_value(QueueState::Paused { draining: true }).unwrap();
        assert_eq!(json, json!({"state": "paused", "draining": true}));
    }

    #[tokio::test]
    async fn drains_in_order_and_goes_idle() {
        let executor = ScriptedExecutor::new(vec![]);
        let (queue, local_state) = queue_with(executor.clone(), RetryPolicy::default());

        queue
            .push(Request::new("A").with_success_data(vec![StateUpdate::set("a", json!(1))]))
            .unwrap();
        queue.push(Request::new("B")).unwrap();
        queue.wait_for_idle().await;

        assert_eq!(executor.sent(), vec!["A", "B"]);
        assert_eq!(queue.length(), 0);
        assert_eq!(queue.state(), QueueState::Idle);
        assert!(!queue.is_running());
        assert_eq!(local_state.get("a"), Some(json!(1)));
    }

    #[tokio::test]
    async fn server_updates_apply_before_success_data() {
        let response = RequestResponse::new(json!({"jsonCode": 200}))
            .with_updates(vec![StateUpdate::set("report", json!({"name": "server"}))]);
        let executor = ScriptedExecutor::new(vec![RequestOutcome::Success(response)]);
        let (queue, local_state) = queue_with(executor, RetryPolicy::default());

        queue
            .push(Request::new("OpenReport").with_success_data(vec![StateUpdate::merge(
                "report",
                json!({"loading": false}),
            )]))
            .unwrap();
        queue.wait_for_idle().await;

        assert_eq!(
            local_state.get("report"),
            Some(json!({"name": "server", "loading": false}))
        );
    }

    #[tokio::test]
    async fn paused_queue_holds_requests_until_unpaused() {
        let executor = ScriptedExecutor::new(vec![]);
        let (queue, _) = queue_with(executor.clone(), RetryPolicy::default());

        queue.pause();
        assert_eq!(queue.state(), QueueState::Paused { draining: false });
        queue.push(Request::new("A")).unwrap();
        queue.flush();
        queue.wait_for_idle().await;

        assert!(executor.sent().is_empty());
        assert_eq!(queue.length(), 1);
        assert!(queue.is_paused());

        queue.unpause();
        queue.wait_for_idle().await;
        assert_eq!(executor.sent(), vec!["A"]);
        assert_eq!(queue.length(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_become_terminal() {
        let executor = ScriptedExecutor::new(vec![
            RequestOutcome::transient("503"),
            RequestOutcome::transient("503"),
            RequestOutcome::transient("503"),
        ]);
        let retry = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let (queue, local_state) = queue_with(executor.clone(), retry);

        queue
            .push(Request::new("A").with_failure_data(vec![StateUpdate::set("a", json!("rolled back"))]))
            .unwrap();
        queue.wait_for_idle().await;

        assert_eq!(executor.sent(), vec!["A", "A", "A"]);
        assert_eq!(queue.length(), 0);
        assert_eq!(local_state.get("a"), Some(json!("rolled back")));
    }
}
