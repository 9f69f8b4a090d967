//! Common test utilities shared across all integration test files.
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! Every test runs against a local `mockito` server. Clients are built with
//! an explicit token and base URL so no test reads or mutates the process
//! environment, and with zero retry backoff so retry tests finish instantly.

#![allow(dead_code)]

use mockito::{Mock, ServerGuard};
use replicate_rs::{Client, ClientBuilder};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

pub const TEST_TOKEN: &str = "r8_test_token";

/// Safety net so a broken polling loop fails instead of hanging the suite.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A builder pointed at the mock server with instant retries and polling.
pub fn test_builder(server_url: &str) -> ClientBuilder {
    Client::builder()
        .api_token(TEST_TOKEN)
        .base_url(server_url)
        .poll_interval(Duration::from_millis(1))
        .retry_backoff(Duration::ZERO)
}

pub fn test_client(server: &ServerGuard) -> Client {
    test_builder(&server.url())
        .build()
        .expect("test client should build")
}

/// Wraps a future with a timeout, panicking if the timeout is exceeded.
pub async fn with_timeout<F, T>(future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("test exceeded timeout")
}

/// A prediction body as the API returns it, with absolute `urls`.
pub fn prediction_json(server_url: &str, id: &str, status: &str) -> Value {
    let mut prediction = json!({
        "id": id,
        "model": "replicate/hello-world",
        "version": "abc123",
        "status": status,
        "input": {"prompt": "x"},
        "output": null,
        "error": null,
        "logs": "",
        "metrics": {},
        "created_at": "2024-01-01T00:00:00.000000Z",
        "started_at": null,
        "completed_at": null,
        "urls": {
            "get": format!("{server_url}/v1/predictions/{id}"),
            "cancel": format!("{server_url}/v1/predictions/{id}/cancel"),
        }
    });

    if status != "starting" {
        prediction["started_at"] = json!("2024-01-01T00:00:01.000000Z");
    }
    if matches!(status, "succeeded" | "failed" | "canceled") {
        prediction["completed_at"] = json!("2024-01-01T00:00:02.000000Z");
        prediction["metrics"] = json!({"predict_time": 1.0});
    }
    prediction
}

/// Mocks one JSON response, expected exactly once.
pub async fn mock_json(
    server: &mut ServerGuard,
    method: &str,
    path: &str,
    status: usize,
    body: &Value,
) -> Mock {
    server
        .mock(method, path)
        .match_header("authorization", format!("Token {TEST_TOKEN}").as_str())
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

/// Mocks a sequence of GET snapshots for one prediction, served in order.
pub async fn mock_polls(server: &mut ServerGuard, id: &str, statuses: &[&str]) -> Vec<Mock> {
    let url = server.url();
    let mut mocks = Vec::with_capacity(statuses.len());
    for status in statuses {
        let body = prediction_json(&url, id, status);
        mocks.push(mock_json(server, "GET", &format!("/v1/predictions/{id}"), 200, &body).await);
    }
    mocks
}
