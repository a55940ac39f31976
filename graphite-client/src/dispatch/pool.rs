//! Fixed-size worker pool executing shard jobs.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::metrics::DispatchMetrics;
use super::planner::Job;
use super::signal::StopSignal;
use crate::error::Result;
use crate::executor::RenderExecutor;
use crate::types::RenderResponse;

/// Result of one executed job
#[derive(Debug)]
pub struct ShardOutcome {
    /// Planning index of the job that produced this
    pub index: usize,
    pub result: Result<RenderResponse>,
}

/// Everything a worker needs, shared by the whole pool
struct WorkerContext<E> {
    executor: Arc<E>,
    jobs: Mutex<mpsc::Receiver<Job>>,
    outcomes: mpsc::Sender<ShardOutcome>,
    stop: Arc<StopSignal>,
    metrics: Arc<DispatchMetrics>,
}

/// Spawn `workers` tasks pulling from `jobs` and reporting to `outcomes`.
///
/// The outcome channel closes once every worker has exited, which happens
/// after the job queue is closed and drained.
pub(crate) fn spawn_workers<E: RenderExecutor>(
    workers: usize,
    executor: Arc<E>,
    jobs: mpsc::Receiver<Job>,
    outcomes: mpsc::Sender<ShardOutcome>,
    stop: Arc<StopSignal>,
    metrics: Arc<DispatchMetrics>,
) -> JoinSet<()> {
    let ctx = Arc::new(WorkerContext {
        executor,
        jobs: Mutex::new(jobs),
        outcomes,
        stop,
        metrics,
    });

    let mut set = JoinSet::new();
    for id in 0..workers.max(1) {
        set.spawn(run_worker(id, Arc::clone(&ctx)));
    }
    set
}

/// Raises the stop signal if dropped while the task is unwinding, so a
/// panicking render call halts the batch like a failed one.
struct StopOnPanic<'a>(&'a StopSignal);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() && self.0.trigger() {
            warn!("Render call panicked, aborting batch");
        }
    }
}

async fn run_worker<E: RenderExecutor>(id: usize, ctx: Arc<WorkerContext<E>>) {
    loop {
        // Holding the lock across recv hands each job to exactly one worker.
        let Some(job) = ctx.jobs.lock().await.recv().await else {
            break;
        };

        if ctx.stop.is_triggered() {
            ctx.metrics.record_skipped();
            debug!(worker = id, shard = job.index, "Skipping shard after stop");
            continue;
        }

        debug!(worker = id, shard = job.index, targets = job.len(), "Executing shard");
        let guard = StopOnPanic(&ctx.stop);
        let result = ctx.executor.render(job.range, job.targets()).await;
        drop(guard);

        match &result {
            Ok(_) => ctx.metrics.record_shard_ok(),
            Err(e) => {
                ctx.metrics.record_shard_failed();
                if ctx.stop.trigger() {
                    warn!(worker = id, shard = job.index, error = %e, "Shard failed, aborting batch");
                }
            }
        }

        let outcome = ShardOutcome { index: job.index, result };
        if ctx.outcomes.send(outcome).await.is_err() {
            // Aggregator is gone; nothing left to report to.
            break;
        }
    }

    debug!(worker = id, "Worker exiting");
}
