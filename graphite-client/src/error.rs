//! Error types for the Graphite client.
//!
//! The dispatcher treats every variant the same way: a shard that returns
//! any error aborts the whole batch, and that error is handed back to the
//! caller untouched.
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphiteError
//! ├── Transport      - connection/network failure before a response
//! ├── Status         - non-200 response (carries the status text)
//! ├── Decode         - body is not the expected JSON shape
//! ├── InvalidUrl     - base endpoint could not be parsed
//! ├── Config         - rejected configuration values
//! └── WorkerPanicked - a pool task died mid-dispatch
//! ```

use thiserror::Error;

/// Errors returned by the Graphite client and the batch dispatcher
#[derive(Error, Debug)]
pub enum GraphiteError {
    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with something other than 200 OK
    #[error("{0}")]
    Status(String),

    /// Response body did not decode
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Base endpoint is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A dispatcher task panicked before reporting its shard
    #[error("Dispatch worker panicked: {0}")]
    WorkerPanicked(String),
}

impl GraphiteError {
    /// Create a status error from the response status line
    pub fn status(status: impl Into<String>) -> Self {
        Self::Status(status.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GraphiteError>;
