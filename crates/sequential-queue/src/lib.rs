//! Sequential request queue.
//!
//! This crate provides:
//! - `SequentialQueue`: pushes requests through their conflict resolver into
//!   the persisted store and sends them one at a time, in order
//! - `NetworkExecutor`: the port a transport implements to send one request
//! - `LocalState`: the port success and failure side effects are applied to
//! - `RetryPolicy`: exponential backoff for retryable failures
//!
//! At most one request is in flight at any time. Failures never surface to
//! the caller of `push`; they are resolved inside the worker by applying the
//! request's declared side effects.

mod error;
mod executor;
mod local_state;
mod queue;
mod retry;

pub use error::{QueueError, QueueResult};
pub use executor::{FailureKind, NetworkExecutor, RequestOutcome, RequestResponse};
pub use local_state::{InMemoryLocalState, LocalState};
pub use queue::{QueueState, SequentialQueue};
pub use retry::RetryPolicy;
