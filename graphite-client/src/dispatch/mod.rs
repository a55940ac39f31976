//! Batch query dispatch for large render requests.
//!
//! Graphite copes badly with render calls naming hundreds of targets (URL
//! length, backend load), so big requests are cut into shards and run
//! concurrently, then stitched back together.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────┐
//!                    │   Dispatcher    │ ← len <= shard_size: one direct call
//!                    └────────┬────────┘
//!                             │ fan-out
//!                    ┌────────▼────────┐
//!                    │   ShardPlan     │ ← lazy [0:S], [S:2S], ...
//!                    └────────┬────────┘
//!                             │ bounded job queue
//!                    ┌────────▼────────┐
//!                    │  Worker pool    │ ← max_workers tasks
//!                    │ RenderExecutor  │
//!                    └────────┬────────┘
//!                             │ outcome queue
//!                    ┌────────▼────────┐
//!                    │   Aggregator    │ ← first error raises StopSignal
//!                    └─────────────────┘
//! ```
//!
//! # Failure semantics
//!
//! One failed shard fails the whole query. The first error observed is
//! returned unchanged and every series gathered so far is discarded; there
//! is no partial result. When several shards fail at once, which one counts
//! as "first" depends on scheduling.
//!
//! Stopping is cooperative: shards already in flight run to completion,
//! the planner emits nothing further, and queued shards are skipped. The
//! dispatcher returns only after every worker task has exited.

mod aggregate;
mod metrics;
mod planner;
mod pool;
mod signal;

pub use metrics::{DispatchMetrics, DispatchSnapshot};
pub use planner::{Job, ShardPlan};
pub use pool::ShardOutcome;
pub use signal::StopSignal;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::config::DispatchConfig;
use crate::error::{GraphiteError, Result};
use crate::executor::RenderExecutor;
use crate::types::{RenderResponse, Request};
use aggregate::Aggregator;

/// Splits large requests across a pool of concurrent render calls
pub struct Dispatcher<E> {
    executor: Arc<E>,
    config: DispatchConfig,
    metrics: Arc<DispatchMetrics>,
}

impl<E: RenderExecutor> Dispatcher<E> {
    /// Create a dispatcher, rejecting a zero shard size or worker count
    pub fn new(executor: E, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { executor: Arc::new(executor), config, metrics: Arc::new(DispatchMetrics::new()) })
    }

    /// The underlying executor
    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> DispatchSnapshot {
        self.metrics.snapshot()
    }

    /// Run a render query, sharding it if it is larger than `shard_size`.
    ///
    /// Returns every series from every shard, or the first error with
    /// nothing else.
    #[instrument(skip(self, request), fields(targets = request.targets.len()))]
    pub async fn query(&self, request: &Request) -> Result<RenderResponse> {
        if request.is_empty() {
            debug!("No targets, skipping render call");
            return Ok(Vec::new());
        }

        if request.len() <= self.config.shard_size {
            self.metrics.record_direct();
            return self.executor.render(request.range, &request.targets).await;
        }

        self.fan_out(request).await
    }

    async fn fan_out(&self, request: &Request) -> Result<RenderResponse> {
        self.metrics.record_fan_out();

        let plan = ShardPlan::new(
            request.range,
            request.targets.clone().into(),
            self.config.shard_size,
        );
        let shards = plan.len();
        let workers = self.config.max_workers.min(shards);

        let stop = Arc::new(StopSignal::new());
        let (job_tx, job_rx) = mpsc::channel(workers);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(workers);

        info!(shards, workers, "Fanning out render query");

        let mut worker_tasks = pool::spawn_workers(
            workers,
            Arc::clone(&self.executor),
            job_rx,
            outcome_tx,
            Arc::clone(&stop),
            Arc::clone(&self.metrics),
        );
        let feeder = tokio::spawn(planner::feed_jobs(plan, job_tx, Arc::clone(&stop)));

        let mut aggregator = Aggregator::new(Arc::clone(&stop));
        aggregator.drain(&mut outcome_rx).await;

        // The outcome queue only closes after every worker is done, so these
        // joins do not wait on any render call.
        let mut panicked = None;
        while let Some(joined) = worker_tasks.join_next().await {
            if let Err(e) = joined {
                panicked = panicked.or(Some(e.to_string()));
            }
        }
        let planned = match feeder.await {
            Ok(planned) => planned,
            Err(e) => {
                panicked = panicked.or(Some(e.to_string()));
                0
            }
        };

        debug!(planned, received = aggregator.received(), "Fan-out complete");

        let result = match panicked {
            Some(reason) => Err(GraphiteError::WorkerPanicked(reason)),
            None => aggregator.finish(),
        };

        match &result {
            Ok(series) => self.metrics.record_series(series.len()),
            Err(_) => self.metrics.record_query_failed(),
        }
        result
    }
}
