//! Wire and request types for the Graphite render API.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Absolute time window for a render call. Unset bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower bound, sent as `from=<unix-seconds>`
    pub from: Option<DateTime<Utc>>,
    /// Upper bound, sent as `until=<unix-seconds>`
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// `from` as unix seconds, if set
    pub fn from_unix(&self) -> Option<i64> {
        self.from.map(|t| t.timestamp())
    }

    /// `until` as unix seconds, if set
    pub fn until_unix(&self) -> Option<i64> {
        self.until.map(|t| t.timestamp())
    }
}

/// A render query: targets plus an optional absolute time range.
///
/// Targets are kept in the order given; duplicates are not removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub range: TimeRange,
    pub targets: Vec<String>,
}

impl Request {
    /// Unbounded request for the given targets
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { range: TimeRange::default(), targets: targets.into_iter().map(Into::into).collect() }
    }

    /// Set the lower bound
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.range.from = Some(from);
        self
    }

    /// Set the upper bound
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.range.until = Some(until);
        self
    }

    /// Number of targets in the request
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when there is nothing to query
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// One sample: `[value-or-null, unix-timestamp]` on the wire.
///
/// Some backends send the timestamp as a float (`1700000000.0`); it is
/// truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint(
    pub Option<f64>,
    #[serde(deserialize_with = "timestamp_from_number")] pub i64,
);

fn timestamp_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() {
        return Err(de::Error::custom(format!("invalid timestamp: {}", secs)));
    }
    Ok(secs as i64)
}

impl DataPoint {
    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.1
    }
}

/// Result for a single target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub target: String,
    #[serde(default)]
    pub datapoints: Vec<DataPoint>,
}

impl Series {
    pub fn new(target: impl Into<String>, datapoints: Vec<DataPoint>) -> Self {
        Self { target: target.into(), datapoints }
    }
}

/// Body of a `/render?format=json` response
pub type RenderResponse = Vec<Series>;

/// Body of a `/metrics/index.json` response
pub type MetricsResponse = Vec<String>;
