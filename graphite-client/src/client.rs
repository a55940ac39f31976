//! HTTP client for the Graphite render and metrics APIs.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::{ClientConfig, DispatchConfig};
use crate::dispatch::{DispatchSnapshot, Dispatcher};
use crate::error::{GraphiteError, Result};
use crate::executor::RenderExecutor;
use crate::types::{MetricsResponse, RenderResponse, Request, TimeRange};

/// Performs single render and metrics calls against one Graphite endpoint
#[derive(Clone)]
pub struct HttpExecutor {
    /// HTTP client
    client: Client,
    /// Graphite base URL
    base_url: Url,
    /// Render calls with at least this many targets go out as POST
    post_threshold: usize,
}

impl HttpExecutor {
    /// Build the transport for `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        info!(url = %base_url, "Creating Graphite client");

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self { client: builder.build()?, base_url, post_threshold: config.post_threshold })
    }

    /// Get the Graphite base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/<suffix>`, keeping any path prefix on the base
    fn endpoint(&self, suffix: &str) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{}", url.path().trim_end_matches('/'), suffix);
        url.set_path(&path);
        url
    }

    /// List every metric name the server knows about
    #[instrument(skip(self))]
    pub async fn list_metrics(&self) -> Result<MetricsResponse> {
        let url = self.endpoint("/metrics/index.json");
        debug!(url = %url, "Listing metrics");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(GraphiteError::status(status.to_string()));
        }

        let body = response.bytes().await?;
        let metrics: MetricsResponse = serde_json::from_slice(&body)?;
        debug!(count = metrics.len(), "Found metrics");
        Ok(metrics)
    }
}

/// Query parameters shared by the GET and POST forms of a render call
fn render_params(range: TimeRange, targets: &[String]) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(targets.len() + 3);
    params.push(("format", "json".to_string()));
    params.extend(targets.iter().map(|t| ("target", t.clone())));
    if let Some(from) = range.from_unix() {
        params.push(("from", from.to_string()));
    }
    if let Some(until) = range.until_unix() {
        params.push(("until", until.to_string()));
    }
    params
}

#[async_trait]
impl RenderExecutor for HttpExecutor {
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    async fn render(&self, range: TimeRange, targets: &[String]) -> Result<RenderResponse> {
        let url = self.endpoint("/render");
        let params = render_params(range, targets);

        // Long target lists overflow URL limits; send them in the body.
        let builder = if targets.len() < self.post_threshold {
            debug!(url = %url, "Sending render request (GET)");
            self.client.get(url).query(&params)
        } else {
            debug!(url = %url, "Sending render request (POST)");
            self.client.post(url).form(&params)
        };

        let response = builder.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!(status = %status, "Render call rejected");
            return Err(GraphiteError::status(status.to_string()));
        }

        let body = response.bytes().await?;
        let series: RenderResponse = serde_json::from_slice(&body)?;
        debug!(series = series.len(), "Render complete");
        Ok(series)
    }
}

/// Graphite client: batch-aware render queries plus metric listing
pub struct GraphiteClient {
    dispatcher: Dispatcher<HttpExecutor>,
}

impl GraphiteClient {
    /// Create a client from explicit configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let executor = HttpExecutor::new(&config)?;
        Ok(Self { dispatcher: Dispatcher::new(executor, config.dispatch)? })
    }

    /// Create a client for `url` with default tuning
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(ClientConfig::new(url))
    }

    /// Create a client from URL parts; an empty scheme means `http`
    pub fn from_parts(scheme: &str, host: &str, path: &str) -> Result<Self> {
        let scheme = if scheme.is_empty() { "http" } else { scheme };
        let separator = if path.is_empty() || path.starts_with('/') { "" } else { "/" };
        Self::from_url(&format!("{}://{}{}{}", scheme, host, separator, path))
    }

    /// Get the Graphite base URL
    pub fn base_url(&self) -> &Url {
        self.dispatcher.executor().base_url()
    }

    /// Sharding parameters in effect
    pub fn dispatch_config(&self) -> &DispatchConfig {
        self.dispatcher.config()
    }

    /// Counters from every query made through this client
    pub fn dispatch_metrics(&self) -> DispatchSnapshot {
        self.dispatcher.metrics()
    }

    /// Fetch series for every target in `request`, splitting large requests
    /// into concurrent shards.
    pub async fn query(&self, request: &Request) -> Result<RenderResponse> {
        self.dispatcher.query(request).await
    }

    /// List every metric name the server knows about
    pub async fn metrics(&self) -> Result<MetricsResponse> {
        self.dispatcher.executor().list_metrics().await
    }
}
