//! CLI command handlers.

use super::wiring::{build_queue, open_store};
use super::AppResult;
use crate::Merge;
use queue_config_and_utils::{Config, Paths};
use queue_protocol_types::{ConflictDecision, ConflictResolver, PersistedRequest, Request, RequestData};
use sequential_queue::{InMemoryLocalState, QueueState, SequentialQueue};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Pending requests as stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    pending: usize,
    requests: Vec<PersistedRequest>,
}

/// Where a drain ended up.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DrainReport {
    #[serde(flatten)]
    state: QueueState,
    remaining: usize,
    local_state: BTreeMap<String, Value>,
}

/// Queue one request, then send everything pending unless `send` is false.
pub async fn push(
    config: &Config,
    paths: &Paths,
    command: &str,
    data: Option<&str>,
    merge: Merge,
    send: bool,
) -> AppResult<()> {
    let mut request = Request::new(command).with_data(parse_payload(data)?);
    if let Some(resolver) = resolver_for(merge, command) {
        request = request.with_shared_resolver(resolver);
    }
    let request_id = request.id;

    let store = open_store(paths).await?;
    let local_state = Arc::new(InMemoryLocalState::new());
    let queue = build_queue(config, store, local_state.clone())?;
    if !send {
        queue.pause();
    }

    let decision = queue.push(request)?;
    info!(request_id = %request_id, command, ?decision, "Request pushed");
    println!("{}", serde_json::to_string(&decision)?);

    if send {
        drain(&queue, &local_state).await?;
    } else {
        queue.wait_for_idle().await;
    }
    Ok(())
}

/// Send everything pending.
pub async fn flush(config: &Config, paths: &Paths) -> AppResult<()> {
    let store = open_store(paths).await?;
    let local_state = Arc::new(InMemoryLocalState::new());
    let queue = build_queue(config, store, local_state.clone())?;
    drain(&queue, &local_state).await
}

/// Print the pending requests.
pub async fn status(paths: &Paths) -> AppResult<()> {
    let store = open_store(paths).await?;
    let requests = store.get_all();
    let report = StatusReport {
        pending: requests.len(),
        requests: requests.iter().map(PersistedRequest::from).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    store.wait_for_persistence().await;
    Ok(())
}

/// Drop every pending request.
pub async fn clear(paths: &Paths) -> AppResult<()> {
    let store = open_store(paths).await?;
    let dropped = store.length();
    store.clear();
    store.wait_for_persistence().await;
    info!(dropped, "Cleared queue");
    println!("{}", serde_json::json!({ "dropped": dropped }));
    Ok(())
}

async fn drain(queue: &SequentialQueue, local_state: &InMemoryLocalState) -> AppResult<()> {
    let report = drain_until(queue, local_state, tokio::signal::ctrl_c()).await;
    if report.state.is_paused() && report.remaining > 0 {
        warn!(remaining = report.remaining, "Queue paused with requests remaining");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Send until the queue settles or `interrupt` fires. On interrupt the queue
/// is paused and the store flushed, so the next run resumes from disk.
async fn drain_until<F>(
    queue: &SequentialQueue,
    local_state: &InMemoryLocalState,
    interrupt: F,
) -> DrainReport
where
    F: Future,
{
    queue.flush();
    tokio::select! {
        _ = queue.wait_for_idle() => {}
        _ = interrupt => {
            warn!("Interrupted, the in-flight request resumes on the next run");
            queue.pause();
            queue.wait_for_persistence().await;
        }
    }

    DrainReport {
        state: queue.state(),
        remaining: queue.length(),
        local_state: local_state.snapshot(),
    }
}

fn parse_payload(data: Option<&str>) -> AppResult<RequestData> {
    let Some(raw) = data else {
        return Ok(RequestData::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(format!("--data must be a JSON object, got {}", other).into()),
    }
}

fn resolver_for(merge: Merge, command: &str) -> Option<ConflictResolver> {
    match merge {
        Merge::Push => None,
        Merge::Replace => Some(ConflictDecision::replace_same_command(command)),
        Merge::Skip => Some(ConflictDecision::skip_if_pending(command)),
    }
}
