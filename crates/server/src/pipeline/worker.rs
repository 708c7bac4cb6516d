//! Bounded worker pool consuming the processing queue.
//!
//! Workers poll for queued cases (woken early by the job signal), execute
//! at most one job at a time each, and periodically reclaim stale locks.
//! Shutdown is cooperative: the current document finishes, the case rolls
//! back, then the worker exits.

use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{process_next, reclaim_stale, WorkerContext};
use crate::extract::EvidenceExtractor;
use crate::storage::DocumentStore;

const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECLAIM_INTERVAL: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Handle to the running pool; dropping it does NOT stop the workers;
/// call [`WorkerPool::shutdown`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing the given providers.
    pub fn spawn(
        pool: Pool<Postgres>,
        store: Arc<dyn DocumentStore>,
        extractor: Arc<EvidenceExtractor>,
        jobs: Arc<Notify>,
        size: usize,
        stale_lock_ttl_seconds: i64,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(size);

        for index in 0..size {
            let ctx = WorkerContext {
                pool: pool.clone(),
                store: store.clone(),
                extractor: extractor.clone(),
                holder_id: Uuid::new_v4(),
                shutdown: shutdown_rx.clone(),
            };
            let jobs = jobs.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(index, ctx, jobs, stale_lock_ttl_seconds).await;
            }));
        }

        Self {
            handles,
            shutdown_tx,
        }
    }

    /// Signal shutdown and wait for every worker to finish its current
    /// document and exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    index: usize,
    mut ctx: WorkerContext,
    jobs: Arc<Notify>,
    stale_lock_ttl_seconds: i64,
) {
    tracing::info!(worker = index, holder = %ctx.holder_id, "processing worker started");
    let mut last_reclaim = tokio::time::Instant::now();

    loop {
        if ctx.cancelled() {
            break;
        }

        match process_next(&ctx).await {
            Ok(true) => {
                // A job ran; check for more work immediately.
                continue;
            }
            Ok(false) => {
                if last_reclaim.elapsed() >= RECLAIM_INTERVAL {
                    last_reclaim = tokio::time::Instant::now();
                    if let Err(e) = reclaim_stale(&ctx.pool, stale_lock_ttl_seconds).await {
                        tracing::warn!(worker = index, "stale lock reclamation failed: {e}");
                    }
                }
                tokio::select! {
                    _ = jobs.notified() => {}
                    _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                    _ = ctx.shutdown.changed() => {}
                }
            }
            Err(e) => {
                tracing::error!(worker = index, "worker iteration failed: {e}");
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = ctx.shutdown.changed() => {}
                }
            }
        }
    }

    tracing::info!(worker = index, "processing worker stopped");
}
