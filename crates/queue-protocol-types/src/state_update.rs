//! Declarative local-state mutations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a [`StateUpdate`] changes the value stored under its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateMethod {
    /// Replace the stored value.
    Set,
    /// Shallow-merge object fields; `null` fields delete. Non-objects replace.
    Merge,
    /// Remove the key.
    Clear,
}

/// One local-state mutation, applied verbatim once a request settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub key: String,
    pub method: UpdateMethod,
    #[serde(default)]
    pub value: Value,
}

impl StateUpdate {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            method: UpdateMethod::Set,
            value,
        }
    }

    pub fn merge(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            method: UpdateMethod::Merge,
            value,
        }
    }

    pub fn clear(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            method: UpdateMethod::Clear,
            value: Value::Null,
        }
    }

    /// Compute the value stored under `key` after this update.
    ///
    /// `None` means the key is removed.
    pub fn apply_to(&self, current: Option<&Value>) -> Option<Value> {
        match self.method {
            UpdateMethod::Clear => None,
            UpdateMethod::Set => match &self.value {
                Value::Null => None,
                value => Some(value.clone()),
            },
            UpdateMethod::Merge => match (current, &self.value) {
                (Some(Value::Object(existing)), Value::Object(patch)) => {
                    let mut merged = existing.clone();
                    for (field, value) in patch {
                        if value.is_null() {
                            merged.remove(field);
                        } else {
                            merged.insert(field.clone(), value.clone());
                        }
                    }
                    Some(Value::Object(merged))
                }
                (_, Value::Object(patch)) => {
                    let fresh = patch
                        .iter()
                        .filter(|(_, value)| !value.is_null())
                        .map(|(field, value)| (field.clone(), value.clone()))
                        .collect();
                    Some(Value::Object(fresh))
                }
                (current, Value::Null) => current.cloned(),
                (_, value) => Some(value.clone()),
            },
        }
    }
}
