//! End-to-end tests against a local stand-in Graphite server.
//!
//! The server records every render call (method and decoded parameters)
//! and answers with one empty series per requested target. A target named
//! `fail` makes it answer 500; a target named `garbage` makes it answer
//! 200 with a body that is not JSON.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use graphite_client::{ClientConfig, GraphiteClient, GraphiteError, Request};
use serde_json::json;

#[derive(Debug, Clone)]
struct RecordedCall {
    method: Method,
    params: Vec<(String, String)>,
}

impl RecordedCall {
    fn targets(&self) -> Vec<&str> {
        self.params.iter().filter(|(k, _)| k == "target").map(|(_, v)| v.as_str()).collect()
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Default)]
struct Backend {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Backend {
    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn decode(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect()
}

fn answer(backend: &Backend, method: Method, params: Vec<(String, String)>) -> Response {
    let call = RecordedCall { method, params };
    let targets: Vec<String> = call.targets().into_iter().map(String::from).collect();
    backend.calls.lock().unwrap().push(call);

    if targets.iter().any(|t| t == "fail") {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if targets.iter().any(|t| t == "garbage") {
        return "<html>not json</html>".into_response();
    }

    let body: Vec<_> = targets
        .iter()
        .map(|t| json!({"target": t, "datapoints": [[1.0, 1700000000], [null, 1700000060]]}))
        .collect();
    Json(body).into_response()
}

async fn render_get(State(backend): State<Backend>, RawQuery(query): RawQuery) -> Response {
    answer(&backend, Method::GET, decode(&query.unwrap_or_default()))
}

async fn render_post(State(backend): State<Backend>, body: String) -> Response {
    answer(&backend, Method::POST, decode(&body))
}

async fn metrics_index() -> Json<Vec<&'static str>> {
    Json(vec!["carbon.agents.a.cpuUsage", "servers.web1.load"])
}

async fn start_server(prefix: &str) -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let routes = Router::new()
        .route("/render", get(render_get).post(render_post))
        .route("/metrics/index.json", get(metrics_index))
        .with_state(backend.clone());
    let app = if prefix.is_empty() { routes } else { Router::new().nest(prefix, routes) };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn client_for(addr: SocketAddr) -> GraphiteClient {
    let mut config = ClientConfig::new(format!("http://{}", addr));
    config.timeout = Some(Duration::from_secs(10));
    GraphiteClient::new(config).unwrap()
}

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("servers.web{}.cpu", i)).collect()
}

#[tokio::test]
async fn test_small_query_uses_get() {
    let (addr, backend) = start_server("").await;
    let client = client_for(addr);

    let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let request = Request::new(names(5)).from(from).until(until);

    let series = client.query(&request).await.unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(series[0].datapoints.len(), 2);
    assert_eq!(series[0].datapoints[1].value(), None);

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::GET);
    assert_eq!(calls[0].param("format"), Some("json"));
    assert_eq!(calls[0].param("from"), Some("1704067200"));
    assert_eq!(calls[0].param("until"), Some("1704153600"));
    assert_eq!(calls[0].targets().len(), 5);
}

#[tokio::test]
async fn test_unbounded_range_omits_from_until() {
    let (addr, backend) = start_server("").await;
    let client = client_for(addr);

    client.query(&Request::new(["a.b"])).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls[0].param("from"), None);
    assert_eq!(calls[0].param("until"), None);
}

#[tokio::test]
async fn test_large_render_call_uses_post() {
    let (addr, backend) = start_server("").await;
    let mut config = ClientConfig::new(format!("http://{}", addr));
    // One shard holds all 35 targets, which is past the POST threshold.
    config.dispatch.shard_size = 50;
    let client = GraphiteClient::new(config).unwrap();

    let series = client.query(&Request::new(names(35))).await.unwrap();
    assert_eq!(series.len(), 35);

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].targets().len(), 35);
    assert_eq!(calls[0].param("format"), Some("json"));
}

#[tokio::test]
async fn test_fan_out_over_http() {
    let (addr, backend) = start_server("").await;
    let client = client_for(addr);
    let request = Request::new(names(45));

    let series = client.query(&request).await.unwrap();
    assert_eq!(series.len(), 45);

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.method == Method::GET));

    let mut sizes: Vec<usize> = calls.iter().map(|c| c.targets().len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![5, 20, 20]);

    let mut returned: Vec<String> = series.into_iter().map(|s| s.target).collect();
    returned.sort();
    let mut expected = request.targets.clone();
    expected.sort();
    assert_eq!(returned, expected);

    assert_eq!(client.dispatch_metrics().shards_executed, 3);
}

#[tokio::test]
async fn test_shard_failure_fails_whole_query() {
    let (addr, _backend) = start_server("").await;
    let client = client_for(addr);

    let mut targets = names(45);
    targets[42] = "fail".to_string();

    let err = client.query(&Request::new(targets)).await.unwrap_err();
    match err {
        GraphiteError::Status(status) => assert_eq!(status, "500 Internal Server Error"),
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_body_is_decode_error() {
    let (addr, _backend) = start_server("").await;
    let client = client_for(addr);

    let err = client.query(&Request::new(["garbage"])).await.unwrap_err();
    assert!(matches!(err, GraphiteError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind then drop to get a port nobody is listening on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr);
    let err = client.query(&Request::new(["a.b"])).await.unwrap_err();
    assert!(matches!(err, GraphiteError::Transport(_)));
}

#[tokio::test]
async fn test_metrics_listing() {
    let (addr, backend) = start_server("").await;
    let client = client_for(addr);

    let metrics = client.metrics().await.unwrap();
    assert_eq!(metrics, vec!["carbon.agents.a.cpuUsage", "servers.web1.load"]);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_metrics_listing_status_error() {
    let (addr, _backend) = start_server("/graphite").await;
    // Base without the prefix: the server has nothing at /metrics/index.json.
    let client = client_for(addr);

    let err = client.metrics().await.unwrap_err();
    assert!(matches!(err, GraphiteError::Status(ref s) if s == "404 Not Found"));
}

#[tokio::test]
async fn test_base_path_prefix() {
    let (addr, backend) = start_server("/graphite").await;
    let client = GraphiteClient::from_url(&format!("http://{}/graphite", addr)).unwrap();

    assert_eq!(client.query(&Request::new(names(3))).await.unwrap().len(), 3);
    assert_eq!(client.metrics().await.unwrap().len(), 2);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_query_makes_no_request() {
    let (addr, backend) = start_server("").await;
    let client = client_for(addr);

    let series = client.query(&Request::default()).await.unwrap();
    assert!(series.is_empty());
    assert!(backend.calls().is_empty());
}
