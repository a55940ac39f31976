//! Graphite client with sharded batch queries.
//!
//! Fetches time series from a Graphite server's `/render` API. Requests
//! naming more targets than the shard size are split into bounded shards,
//! executed concurrently by a fixed pool of workers and merged back into a
//! single response. A failure in any shard fails the whole query.
//!
//! ## Quick Start
//!
//! ```no_run
//! use graphite_client::{GraphiteClient, Request};
//!
//! #[tokio::main]
//! async fn main() -> graphite_client::Result<()> {
//!     let client = GraphiteClient::from_url("http://graphite.local:8080")?;
//!
//!     let targets = (0..100).map(|i| format!("servers.web{}.cpu.load", i));
//!     let series = client.query(&Request::new(targets)).await?;
//!     println!("{} series", series.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod types;

pub use client::{GraphiteClient, HttpExecutor};
pub use config::{ClientConfig, DispatchConfig};
pub use dispatch::{DispatchSnapshot, Dispatcher};
pub use error::{GraphiteError, Result};
pub use executor::RenderExecutor;
pub use types::{DataPoint, MetricsResponse, RenderResponse, Request, Series, TimeRange};
