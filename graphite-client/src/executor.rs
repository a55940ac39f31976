//! The seam between the dispatcher and whatever performs a render call.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RenderResponse, TimeRange};

/// Performs one render round trip for a bounded set of targets.
///
/// The dispatcher never passes more targets than its shard size.
#[async_trait]
pub trait RenderExecutor: Send + Sync + 'static {
    async fn render(&self, range: TimeRange, targets: &[String]) -> Result<RenderResponse>;
}

