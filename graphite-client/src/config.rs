//! Configuration for the Graphite client and batch dispatcher.

use std::time::Duration;

use crate::error::{GraphiteError, Result};

/// Targets per render call; also the single-shot threshold
pub const DEFAULT_SHARD_SIZE: usize = 20;

/// Concurrent render calls during a fan-out
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Target count at which render calls switch from GET to form POST
pub const DEFAULT_POST_THRESHOLD: usize = 30;

/// Base endpoint used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Configuration for splitting large queries into shards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum targets per shard
    /// Requests with at most this many targets are sent as one call
    pub shard_size: usize,

    /// Number of workers executing shards concurrently
    pub max_workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { shard_size: DEFAULT_SHARD_SIZE, max_workers: DEFAULT_MAX_WORKERS }
    }
}

impl DispatchConfig {
    /// Reject values that would make dispatch impossible
    pub fn validate(&self) -> Result<()> {
        if self.shard_size == 0 {
            return Err(GraphiteError::config("shard_size must be at least 1"));
        }
        if self.max_workers == 0 {
            return Err(GraphiteError::config("max_workers must be at least 1"));
        }
        Ok(())
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Graphite base URL, e.g. `http://graphite.local/graphite`
    pub base_url: String,

    /// Per-call HTTP timeout (none by default)
    pub timeout: Option<Duration>,

    /// Render calls with at least this many targets are sent as POST
    pub post_threshold: usize,

    /// Sharding parameters
    pub dispatch: DispatchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            post_threshold: DEFAULT_POST_THRESHOLD,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with default tuning
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }

    /// Create config from environment variables
    ///
    /// Reads `GRAPHITE_URL`, `GRAPHITE_TIMEOUT_SECS`, `GRAPHITE_POST_THRESHOLD`,
    /// `GRAPHITE_SHARD_SIZE` and `GRAPHITE_MAX_WORKERS`. Values that fail to
    /// parse are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("GRAPHITE_URL") {
            config.base_url = url;
        }

        if let Some(n) = lookup("GRAPHITE_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.timeout = Some(Duration::from_secs(n));
        }

        if let Some(n) = lookup("GRAPHITE_POST_THRESHOLD").and_then(|s| s.parse().ok()) {
            config.post_threshold = n;
        }

        if let Some(n) = lookup("GRAPHITE_SHARD_SIZE").and_then(|s| s.parse().ok()) {
            config.dispatch.shard_size = n;
        }

        if let Some(n) = lookup("GRAPHITE_MAX_WORKERS").and_then(|s| s.parse().ok()) {
            config.dispatch.max_workers = n;
        }

        config
    }
}
