//! Shard planning: cutting a target list into bounded, contiguous jobs.

use std::ops::Range;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::signal::StopSignal;
use crate::types::TimeRange;

/// One shard bound to the request's time range. Owned by a single worker.
#[derive(Debug, Clone)]
pub struct Job {
    /// Position of this shard in planning order
    pub index: usize,
    pub range: TimeRange,
    targets: Arc<[String]>,
    bounds: Range<usize>,
}

impl Job {
    /// The slice of the request's targets this job covers
    pub fn targets(&self) -> &[String] {
        &self.targets[self.bounds.clone()]
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// Lazy sequence of shards `[0:S], [S:2S], ...`; the last may be short.
///
/// Nothing is materialized ahead of the consumer, so stopping iteration
/// early leaves the remaining shards unplanned.
#[derive(Debug, Clone)]
pub struct ShardPlan {
    targets: Arc<[String]>,
    range: TimeRange,
    shard_size: usize,
    offset: usize,
    index: usize,
}

impl ShardPlan {
    /// `shard_size` of zero is treated as one
    pub fn new(range: TimeRange, targets: Arc<[String]>, shard_size: usize) -> Self {
        Self { targets, range, shard_size: shard_size.max(1), offset: 0, index: 0 }
    }

    /// Shards not yet emitted
    pub fn remaining(&self) -> usize {
        let left = self.targets.len() - self.offset;
        left.div_ceil(self.shard_size)
    }
}

impl Iterator for ShardPlan {
    type Item = Job;

    fn next(&mut self) -> Option<Job> {
        if self.offset >= self.targets.len() {
            return None;
        }

        let end = (self.offset + self.shard_size).min(self.targets.len());
        let job = Job {
            index: self.index,
            range: self.range,
            targets: Arc::clone(&self.targets),
            bounds: self.offset..end,
        };
        self.offset = end;
        self.index += 1;
        Some(job)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ShardPlan {}

/// Push planned jobs into the pool's queue until the plan runs out or the
/// stop signal fires. Returns the number of jobs handed off.
///
/// Dropping `jobs` on return closes the queue, which is what lets idle
/// workers exit.
pub(crate) async fn feed_jobs(
    plan: ShardPlan,
    jobs: mpsc::Sender<Job>,
    stop: Arc<StopSignal>,
) -> usize {
    let total = plan.len();
    let mut sent = 0;

    for job in plan {
        let index = job.index;
        tokio::select! {
            biased;
            _ = stop.triggered() => {
                debug!(sent, total, "Stop signalled, no further shards planned");
                break;
            }
            res = jobs.send(job) => {
                if res.is_err() {
                    // Every worker is gone; nobody left to run the rest.
                    debug!(shard = index, "Job queue closed early");
                    break;
                }
                sent += 1;
            }
        }
    }

    sent
}
