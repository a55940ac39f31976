//! Fan-in: merging shard outcomes into one response or one error.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::pool::ShardOutcome;
use super::signal::StopSignal;
use crate::error::{GraphiteError, Result};
use crate::types::RenderResponse;

/// Accumulates shard results until the outcome stream ends.
///
/// Series are appended in completion order. The first error observed
/// raises the stop signal and wins; everything collected so far is dropped
/// and later outcomes are drained without being kept.
pub(crate) struct Aggregator {
    series: RenderResponse,
    first_error: Option<GraphiteError>,
    received: usize,
    stop: Arc<StopSignal>,
}

impl Aggregator {
    pub fn new(stop: Arc<StopSignal>) -> Self {
        Self { series: Vec::new(), first_error: None, received: 0, stop }
    }

    /// Fold one outcome into the running state
    pub fn accept(&mut self, outcome: ShardOutcome) {
        self.received += 1;
        match outcome.result {
            Ok(series) if self.first_error.is_none() => self.series.extend(series),
            Ok(_) => {}
            Err(err) if self.first_error.is_none() => {
                self.stop.trigger();
                self.series = Vec::new();
                self.first_error = Some(err);
            }
            Err(err) => {
                debug!(shard = outcome.index, error = %err, "Dropping error after first failure");
            }
        }
    }

    /// Drain `outcomes` until every sender is gone
    pub async fn drain(&mut self, outcomes: &mut mpsc::Receiver<ShardOutcome>) {
        while let Some(outcome) = outcomes.recv().await {
            self.accept(outcome);
        }
    }

    /// Outcomes seen so far
    pub fn received(&self) -> usize {
        self.received
    }

    /// Whole response, or the first error with nothing else
    pub fn finish(self) -> Result<RenderResponse> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.series),
        }
    }
}
