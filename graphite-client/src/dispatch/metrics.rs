//! Counters for monitoring the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lifetime counters for one dispatcher, shared with its workers
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Queries answered with a single render call
    pub queries_direct: AtomicU64,

    /// Queries split into shards
    pub queries_fanned_out: AtomicU64,

    /// Fanned-out queries that ended in an error
    pub queries_failed: AtomicU64,

    /// Shards whose render call returned (either way)
    pub shards_executed: AtomicU64,

    /// Shards whose render call returned an error
    pub shards_failed: AtomicU64,

    /// Shards dequeued after the stop signal and never executed
    pub shards_skipped: AtomicU64,

    /// Series handed back to callers from fanned-out queries
    pub series_returned: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_direct(&self) {
        self.queries_direct.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fan_out(&self) {
        self.queries_fanned_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shard_ok(&self) {
        self.shards_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shard_failed(&self) {
        self.shards_executed.fetch_add(1, Ordering::Relaxed);
        self.shards_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.shards_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_series(&self, count: usize) {
        self.series_returned.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            queries_direct: self.queries_direct.load(Ordering::Relaxed),
            queries_fanned_out: self.queries_fanned_out.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            shards_executed: self.shards_executed.load(Ordering::Relaxed),
            shards_failed: self.shards_failed.load(Ordering::Relaxed),
            shards_skipped: self.shards_skipped.load(Ordering::Relaxed),
            series_returned: self.series_returned.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`DispatchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub queries_direct: u64,
    pub queries_fanned_out: u64,
    pub queries_failed: u64,
    pub shards_executed: u64,
    pub shards_failed: u64,
    pub shards_skipped: u64,
    pub series_returned: u64,
}

impl DispatchSnapshot {
    /// Fraction of executed shards that failed
    pub fn shard_failure_rate(&self) -> f64 {
        if self.shards_executed == 0 {
            0.0
        } else {
            self.shards_failed as f64 / self.shards_executed as f64
        }
    }
}
