//! Local state port that side effects are applied to.

use parking_lot::Mutex;
use queue_protocol_types::StateUpdate;
use serde_json::Value;
use std::collections::BTreeMap;

/// Destination for a request's declared side effects.
///
/// Called from the queue worker only, so updates from different requests are
/// never interleaved.
pub trait LocalState: Send + Sync {
    fn apply(&self, updates: &[StateUpdate]);
}

/// Keyed JSON values held in memory.
#[derive(Default)]
pub struct InMemoryLocalState {
    values: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryLocalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.lock().clone()
    }
}

impl LocalState for InMemoryLocalState {
    fn apply(&self, updates: &[StateUpdate]) {
        let mut values = self.values.lock();
        for update in updates {
            match update.apply_to(values.get(&update.key)) {
                Some(next) => {
                    values.insert(update.key.clone(), next);
                }
                None => {
                    values.remove(&update.key);
                }
            }
        }
    }
}
