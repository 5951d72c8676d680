//! Ordered background persistence.
//!
//! Snapshots are queued on an unbounded channel and written by a single
//! task, so storage sees them in the same order the store mutated memory.
//! Callers never wait on a write unless they ask to via [`PersistWriter::flush`].

use crate::KeyValueStorage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

pub(crate) enum PersistJob {
    Write { key: &'static str, value: String },
    Remove { key: &'static str },
}

impl PersistJob {
    fn key(&self) -> &'static str {
        match self {
            PersistJob::Write { key, .. } | PersistJob::Remove { key } => key,
        }
    }
}

pub(crate) struct PersistWriter {
    tx: mpsc::UnboundedSender<(u64, PersistJob)>,
    submitted: AtomicU64,
    completed: watch::Receiver<u64>,
}

impl PersistWriter {
    pub(crate) fn spawn(storage: Arc<dyn KeyValueStorage>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, PersistJob)>();
        let (completed_tx, completed) = watch::channel(0u64);

        tokio::spawn(async move {
            while let Some((seq, job)) = rx.recv().await {
                let key = job.key();
                let result = match &job {
                    PersistJob::Write { key, value } => storage.write(key, value).await,
                    PersistJob::Remove { key } => storage.remove(key).await,
                };
                match result {
                    Ok(()) => debug!(key, seq, "Persisted queue snapshot"),
                    Err(e) => warn!(key, seq, error = %e, "Failed to persist queue snapshot"),
                }
                // Failed writes still count as settled; memory stays authoritative.
                completed_tx.send_replace(seq);
            }
            debug!("Persistence writer stopped");
        });

        Self {
            tx,
            submitted: AtomicU64::new(0),
            completed,
        }
    }

    /// Queue a job. Must be called while holding the store lock.
    pub(crate) fn submit(&self, job: PersistJob) {
        let seq = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send((seq, job)).is_err() {
            warn!(seq, "Persistence writer is gone, snapshot dropped");
        }
    }

    /// Wait until every job submitted so far has been attempted.
    pub(crate) async fn flush(&self) {
        let target = self.submitted.load(Ordering::SeqCst);
        let mut completed = self.completed.clone();
        // An error means the writer task has exited; nothing left to wait for.
        let _ = completed.wait_for(|done| *done >= target).await;
    }
}
