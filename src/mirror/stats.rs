// src/mirror/stats.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Lock-free counters shared by all pipeline workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::mirror::pipeline::MirrorOutcome;

/// Final counters of one mirror run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub total_objects: u64,
    pub copied_objects: u64,
    pub skipped_objects: u64,
    pub errors: u64,
    pub bytes_transferred: u64,
    pub elapsed: Duration,
}

impl MirrorStats {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Every dispatched object resolved to exactly one outcome.
    pub fn is_balanced(&self) -> bool {
        self.total_objects == self.copied_objects + self.skipped_objects + self.errors
    }

    pub fn throughput_mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.bytes_transferred as f64 / 1_048_576.0) / secs
    }
}

/// Accumulates outcomes from concurrent workers.
///
/// Each counter is an independent atomic; only the final snapshot (taken after
/// every worker has been joined) is meaningful.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    total_objects: AtomicU64,
    copied_objects: AtomicU64,
    skipped_objects: AtomicU64,
    errors: AtomicU64,
    bytes_transferred: AtomicU64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total_objects.store(total, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: &MirrorOutcome) {
        match outcome {
            MirrorOutcome::Copied { bytes } => {
                self.copied_objects.fetch_add(1, Ordering::Relaxed);
                self.bytes_transferred.fetch_add(*bytes, Ordering::Relaxed);
            }
            MirrorOutcome::Skipped(_) => {
                self.skipped_objects.fetch_add(1, Ordering::Relaxed);
            }
            MirrorOutcome::Failed(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self, elapsed: Duration) -> MirrorStats {
        MirrorStats {
            total_objects: self.total_objects.load(Ordering::Relaxed),
            copied_objects: self.copied_objects.load(Ordering::Relaxed),
            skipped_objects: self.skipped_objects.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            elapsed,
        }
    }
}
