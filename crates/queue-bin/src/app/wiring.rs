//! Builds the store and queue from configuration.

use super::AppResult;
use http_request_executor::{ExecutorConfig, HttpExecutor};
use persisted_requests::{PersistedRequests, SqliteStorage};
use queue_config_and_utils::{Config, Paths};
use queue_database::AsyncDatabase;
use sequential_queue::{InMemoryLocalState, RetryPolicy, SequentialQueue};
use std::sync::Arc;
use tracing::debug;

/// Open the on-disk store, recovering any request left in flight.
pub async fn open_store(paths: &Paths) -> AppResult<Arc<PersistedRequests>> {
    let db = AsyncDatabase::open(&paths.database_file()).await?;
    debug!(path = %db.path(), "Opened queue database");
    let storage = Arc::new(SqliteStorage::new(db));
    Ok(Arc::new(PersistedRequests::load(storage).await))
}

/// Queue sending over HTTP, with side effects applied to process memory.
pub fn build_queue(
    config: &Config,
    store: Arc<PersistedRequests>,
    local_state: Arc<InMemoryLocalState>,
) -> AppResult<SequentialQueue> {
    let executor = HttpExecutor::new(ExecutorConfig::from_config(config))?;
    Ok(SequentialQueue::new(
        store,
        Arc::new(executor),
        local_state,
        RetryPolicy::from_config(config),
    ))
}
