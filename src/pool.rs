//! Bounded CPU pool for decode/resize/encode work.
//!
//! Transcoding is CPU-bound and must never run on the async runtime's
//! threads. [`TranscodePool`] owns a dedicated rayon pool and a semaphore
//! that caps queued plus running jobs at `threads * queue_depth`. Callers
//! past that cap wait for a permit instead of piling more work onto the
//! pool, which bounds peak memory.
//!
//! Each job gets a [`CancellationToken`]. If the future returned by
//! [`TranscodePool::run`] is dropped (client went away), the token is
//! cancelled and the job bails out at its next checkpoint.

use crate::presets::PresetName;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

/// Identifies a job in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTag {
    pub request_id: Uuid,
    pub preset: PresetName,
}

impl JobTag {
    pub fn new(preset: PresetName) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            preset,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to start worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
    /// The worker dropped its result channel without answering (panic).
    #[error("worker terminated before returning a result")]
    WorkerLost,
}

pub struct TranscodePool {
    pool: rayon::ThreadPool,
    permits: Arc<Semaphore>,
    threads: usize,
    capacity: usize,
}

impl TranscodePool {
    pub fn new(threads: usize, queue_depth: usize) -> Result<Self, PoolError> {
        let threads = threads.max(1);
        let capacity = threads * queue_depth.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("transcode-{i}"))
            .panic_handler(|panic| {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %msg, "transcode worker panicked");
            })
            .build()?;
        Ok(Self {
            pool,
            permits: Arc::new(Semaphore::new(capacity)),
            threads,
            capacity,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Maximum number of jobs queued or running at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on the pool and await its result.
    ///
    /// Waits for a queue slot first. The job receives a token that is
    /// cancelled if this future is dropped before completion.
    pub async fn run<T, F>(&self, tag: JobTag, job: F) -> Result<T, PoolError>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
    {
        let span = info_span!(
            "transcode_job",
            request_id = %tag.request_id,
            preset = %tag.preset
        );

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .instrument(span.clone())
            .await
            // The semaphore is never closed, so acquiring cannot fail.
            .map_err(|_| PoolError::WorkerLost)?;

        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let (tx, rx) = oneshot::channel();

        let job_span = span.clone();
        self.pool.spawn(move || {
            let out = {
                let _entered = job_span.enter();
                job(&cancel)
            };
            // Free the slot before the caller wakes up.
            drop(permit);
            // Receiver is gone when the caller was dropped; nothing to do.
            let _ = tx.send(out);
        });

        let result = rx.instrument(span).await.map_err(|_| PoolError::WorkerLost);
        guard.disarm();
        result
    }
}
