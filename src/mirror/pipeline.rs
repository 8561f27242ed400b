// src/mirror/pipeline.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Fixed-size worker pool that copies one object per job.
//!
//! The dispatcher feeds a bounded MPMC queue and closes it once every job is
//! enqueued; exactly `workers` tasks drain it. `run` returns only after all
//! worker tasks have been joined, so every job has been folded into the stats.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mirror::diff::{decide, Decision};
use crate::mirror::stats::StatsAggregator;
use crate::object_store::{ObjectDescriptor, ObjectStore};

/// One unit of work: a listed source object and where it lands on the target.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    pub source: ObjectDescriptor,
    pub target_key: String,
}

impl MirrorJob {
    pub fn new(source: ObjectDescriptor, target_prefix: &str) -> Self {
        let target_key = resolve_target_key(target_prefix, &source.key);
        Self { source, target_key }
    }
}

/// Plain concatenation; the prefix is used exactly as configured.
pub fn resolve_target_key(target_prefix: &str, source_key: &str) -> String {
    if target_prefix.is_empty() {
        source_key.to_owned()
    } else {
        format!("{target_prefix}{source_key}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    IdenticalFingerprint,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to get object {key}: {reason:#}")]
    Fetch { key: String, reason: anyhow::Error },

    #[error("failed to put object {key}: {reason:#}")]
    Store { key: String, reason: anyhow::Error },

    #[error("transfer of {key} cancelled")]
    Cancelled { key: String },
}

/// Result of processing one job. Dry-run copies report `bytes: 0`.
#[derive(Debug)]
pub enum MirrorOutcome {
    Copied { bytes: u64 },
    Skipped(SkipReason),
    Failed(TransferError),
}

/// Everything a worker needs; cloned once per worker task.
#[derive(Clone)]
pub struct CopyPipeline {
    source: Arc<dyn ObjectStore>,
    target: Arc<dyn ObjectStore>,
    workers: usize,
    dry_run: bool,
    verbose: bool,
    cancel: CancellationToken,
}

impl CopyPipeline {
    pub fn new(
        source: Arc<dyn ObjectStore>,
        target: Arc<dyn ObjectStore>,
        workers: usize,
        dry_run: bool,
        verbose: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            workers: workers.max(1),
            dry_run,
            verbose,
            cancel,
        }
    }

    /// Process every job exactly once and fold each outcome into `stats`.
    ///
    /// Per-job failures never surface here; an `Err` means a worker task
    /// itself died (panic), which leaves the stats incomplete.
    pub async fn run(&self, jobs: Vec<MirrorJob>, stats: Arc<StatsAggregator>) -> Result<()> {
        let (tx, rx) = async_channel::bounded::<MirrorJob>(self.workers * 2);

        let mut handles = FuturesUnordered::new();
        for id in 0..self.workers {
            let worker = self.clone();
            let rx = rx.clone();
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                let mut processed = 0usize;
                while let Ok(job) = rx.recv().await {
                    let outcome = worker.process(job).await;
                    stats.record(&outcome);
                    processed += 1;
                }
                debug!("worker {} done after {} jobs", id, processed);
            }));
        }
        drop(rx);

        for job in jobs {
            if tx.send(job).await.is_err() {
                // Every receiver is gone; the join below reports why.
                break;
            }
        }
        tx.close();

        let mut failed_workers = 0usize;
        while let Some(res) = handles.next().await {
            if let Err(e) = res {
                error!("mirror worker task failed: {}", e);
                failed_workers += 1;
            }
        }
        if failed_workers > 0 {
            return Err(anyhow!("{} mirror worker(s) terminated abnormally", failed_workers));
        }
        Ok(())
    }

    /// Run one job to its outcome. Cancellation wins over any in-flight call.
    pub async fn process(&self, job: MirrorJob) -> MirrorOutcome {
        if self.cancel.is_cancelled() {
            return MirrorOutcome::Failed(TransferError::Cancelled { key: job.source.key });
        }
        let key = job.source.key.clone();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Cancelled while mirroring {}", key);
                MirrorOutcome::Failed(TransferError::Cancelled { key })
            }
            outcome = self.mirror_one(&job) => outcome,
        }
    }

    async fn mirror_one(&self, job: &MirrorJob) -> MirrorOutcome {
        let src = &job.source;

        // A lookup error other than not-found counts as absent.
        let existing = match self.target.stat(&job.target_key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Could not stat target {} ({:#}); copying anyway", job.target_key, e);
                None
            }
        };

        if decide(src, existing.as_ref()) == Decision::Skip {
            if self.verbose {
                info!("Skipping {} (already exists with same ETag)", src.key);
            } else {
                debug!("Skipping {} (already exists with same ETag)", src.key);
            }
            return MirrorOutcome::Skipped(SkipReason::IdenticalFingerprint);
        }

        if self.dry_run {
            info!("[DRY RUN] Would copy: {} -> {} ({} bytes)", src.key, job.target_key, src.size);
            return MirrorOutcome::Copied { bytes: 0 };
        }

        match self.transfer(job).await {
            Ok(bytes) => {
                if self.verbose {
                    info!("Copied: {} -> {} ({} bytes)", src.key, job.target_key, bytes);
                } else {
                    debug!("Copied: {} -> {} ({} bytes)", src.key, job.target_key, bytes);
                }
                MirrorOutcome::Copied { bytes }
            }
            Err(e) => {
                error!("Error copying {}: {}", src.key, e);
                MirrorOutcome::Failed(e)
            }
        }
    }

    /// Stream the source body straight into the target. The body is owned by
    /// this call and dropped on every exit path.
    async fn transfer(&self, job: &MirrorJob) -> Result<u64, TransferError> {
        let src = &job.source;
        let body = self
            .source
            .get(&src.key)
            .await
            .map_err(|reason| TransferError::Fetch { key: src.key.clone(), reason })?;

        self.target
            .put(&job.target_key, body, src.size)
            .await
            .map_err(|reason| TransferError::Store { key: job.target_key.clone(), reason })?;

        Ok(src.size)
    }
}
