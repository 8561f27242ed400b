// src/mirror/mod.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Bucket-to-bucket mirroring.
//!
//! [`MirrorService::mirror`] lists the source under the configured prefix,
//! turns each object into a [`MirrorJob`], runs the jobs through the
//! [`CopyPipeline`] and returns the aggregated [`MirrorStats`].
//!
//! Only a listing failure is fatal. Per-object failures are counted in
//! `MirrorStats::errors` and logged; the caller picks the exit code.

pub mod diff;
pub mod pipeline;
pub mod stats;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::MirrorConfig;
use crate::object_store::ObjectStore;

pub use diff::{decide, Decision};
pub use pipeline::{resolve_target_key, CopyPipeline, MirrorJob, MirrorOutcome, SkipReason, TransferError};
pub use stats::{MirrorStats, StatsAggregator};

/// Mirrors one source store into one target store.
pub struct MirrorService {
    source: Arc<dyn ObjectStore>,
    target: Arc<dyn ObjectStore>,
    config: MirrorConfig,
    cancel: CancellationToken,
}

impl MirrorService {
    /// `config` is expected to be validated already.
    pub fn new(source: Arc<dyn ObjectStore>, target: Arc<dyn ObjectStore>, config: MirrorConfig) -> Self {
        Self {
            source,
            target,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external token, e.g. one tied to Ctrl-C.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one full mirror pass. Each call starts from fresh counters.
    pub async fn mirror(&self) -> Result<MirrorStats> {
        let started = Instant::now();
        let source_prefix = self.config.source.prefix.as_str();
        let target_prefix = self.config.target.prefix.as_str();

        info!("Starting mirror from {} to {}", self.source.bucket(), self.target.bucket());
        if !source_prefix.is_empty() {
            info!("Using source prefix filter: {}", source_prefix);
        }
        if !target_prefix.is_empty() {
            info!("Using target key prefix: {}", target_prefix);
        }
        if self.config.dry_run {
            info!("DRY RUN MODE - No actual copying will occur");
        }

        let objects = self
            .source
            .list(source_prefix)
            .await
            .context("failed to list source objects")?;

        let stats = Arc::new(StatsAggregator::new());
        stats.set_total(objects.len() as u64);
        info!("Found {} objects to process (workers={})", objects.len(), self.config.workers);

        let jobs: Vec<MirrorJob> = objects
            .into_iter()
            .map(|obj| MirrorJob::new(obj, target_prefix))
            .collect();

        let pipeline = CopyPipeline::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            self.config.workers,
            self.config.dry_run,
            self.config.verbose,
            self.cancel.clone(),
        );
        pipeline.run(jobs, Arc::clone(&stats)).await?;

        let result = stats.snapshot(started.elapsed());
        info!(
            "Mirror finished: {} total, {} copied, {} skipped, {} errors, {} bytes in {:.2}s",
            result.total_objects,
            result.copied_objects,
            result.skipped_objects,
            result.errors,
            result.bytes_transferred,
            result.elapsed.as_secs_f64()
        );
        Ok(result)
    }
}
