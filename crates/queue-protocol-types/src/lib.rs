//! Request record types shared by the store, the queue, and executors.
//!
//! Everything here is plain data: no I/O and no async. A [`Request`] carries
//! an opaque JSON payload plus the declarative [`StateUpdate`]s to apply once
//! the network outcome is known, and an optional [`ConflictResolver`] that
//! decides how it merges with requests already waiting.

mod conflict;
mod request;
mod state_update;

pub use conflict::{ConflictDecision, ConflictResolver};
pub use request::{PersistedRequest, Request, RequestData, RequestId};
pub use state_update::{StateUpdate, UpdateMethod};
