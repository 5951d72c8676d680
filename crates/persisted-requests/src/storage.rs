//! Persistence port and its adapters.

use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use queue_database::{queries, AsyncDatabase};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Key-value durable storage used to persist queue snapshots.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// SQLite-backed storage.
#[derive(Clone)]
pub struct SqliteStorage {
    db: AsyncDatabase,
}

impl SqliteStorage {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        Ok(self.db.call(move |conn| queries::get_value(conn, &key)).await?)
    }

    async fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        Ok(self
            .db
            .call(move |conn| queries::set_value(conn, &key, &value))
            .await?)
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.db
            .call(move |conn| queries::delete_value(conn, &key))
            .await?;
        Ok(())
    }
}

/// Process-local storage. Can be told to reject writes, which is how tests
/// exercise degraded persistence.
#[derive(Default)]
pub struct InMemoryStorage {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current raw value, bypassing the async port.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.values.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_storage_roundtrip() {
        let db = AsyncDatabase::open_in_memory().await.unwrap();
        let storage = SqliteStorage::new(db);

        assert_eq!(storage.read("k").await.unwrap(), None);
        storage.write("k", "v1").await.unwrap();
        storage.write("k", "v2").await.unwrap();
        assert_eq!(storage.read("k").await.unwrap().as_deref(), Some("v2"));

        storage.remove("k").await.unwrap();
        assert_eq!(storage.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_storage_can_fail_writes() {
        let storage = InMemoryStorage::new();
        storage.write("k", "v").await.unwrap();

        storage.set_fail_writes(true);
        let err = storage.write("k", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(storage.read("k").await.unwrap().as_deref(), Some("v"));
    }
}
