//! The retrying request path shared by every namespace.
//!
//! There is exactly one request algorithm. The non-blocking client awaits it
//! directly; the blocking client drives the same future on a private
//! current-thread runtime, so both faces share retry, backoff, and error
//! normalization by construction.

use super::common::{self, authorization_value, resolve_url};
use super::error_helpers::{check_response, deserialize_with_context, read_error};
use super::loud_wire;
use super::retry::{Backoff, RetryPolicy};
use crate::config;
use crate::errors::ReplicateError;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Optional parts of a raw request made through [`Client::request`](crate::Client::request).
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; authentication and `User-Agent` are always added.
    pub headers: HeaderMap,
    /// JSON body
    pub body: Option<serde_json::Value>,
    /// Query string parameters
    pub query: Vec<(String, String)>,
    /// File upload sent as `multipart/form-data` instead of `body`
    pub(crate) multipart: Option<MultipartFile>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// One file part, plus text fields, for a `multipart/form-data` request.
///
/// Kept as plain data so the form can be rebuilt for every attempt.
#[derive(Debug, Clone)]
pub(crate) struct MultipartFile {
    pub field: &'static str,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub text_fields: Vec<(&'static str, String)>,
}

impl MultipartFile {
    fn to_form(&self) -> Result<Form, ReplicateError> {
        let part = Part::bytes(self.bytes.to_vec())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)
            .map_err(|e| {
                ReplicateError::Validation(format!(
                    "invalid content type {:?}: {e}",
                    self.content_type
                ))
            })?;
        let mut form = Form::new().part(self.field, part);
        for (name, value) in &self.text_fields {
            form = form.text(*name, value.clone());
        }
        Ok(form)
    }

    fn summary(&self) -> String {
        format!(
            "<multipart {}: {} ({}, {} bytes)>",
            self.field,
            self.file_name,
            self.content_type,
            self.bytes.len()
        )
    }
}

/// A fully buffered successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Json`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ReplicateError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Utf8`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str, ReplicateError> {
        Ok(std::str::from_utf8(&self.body)?)
    }
}

/// Settings that shape the connection pools and the retry budget.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransportSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub backoff: Backoff,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub pool_idle_timeout: Option<Option<Duration>>,
}

/// Holds the base URL, token configuration, and two connection pools.
///
/// Reads and writes use independent pools because their retry policies
/// differ; both are safe to share across concurrent calls.
#[derive(Debug)]
pub(crate) struct Transport {
    read: reqwest::Client,
    write: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    backoff: Backoff,
}

impl Transport {
    pub(crate) fn new(settings: TransportSettings) -> Result<Self, ReplicateError> {
        let build_pool = || {
            let mut builder = reqwest::Client::builder().user_agent(common::USER_AGENT);
            if let Some(timeout) = settings.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(connect_timeout) = settings.connect_timeout {
                builder = builder.connect_timeout(connect_timeout);
            }
            if let Some(idle) = settings.pool_idle_timeout {
                builder = builder.pool_idle_timeout(idle);
            }
            builder
                .build()
                .map_err(|e| ReplicateError::ClientBuild(e.to_string()))
        };

        Ok(Self {
            read: build_pool()?,
            write: build_pool()?,
            base_url: settings.base_url,
            api_token: settings.api_token,
            backoff: settings.backoff,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a request under the retry policy for its method.
    ///
    /// Returns the response once it is successful. Retryable statuses and
    /// connection failures are retried with backoff until the budget is
    /// spent; the last failure is then wrapped in
    /// [`ReplicateError::RetriesExhausted`].
    pub(crate) async fn send(
        &self,
        request_id: usize,
        method: Method,
        target: &str,
        options: &RequestOptions,
    ) -> Result<Response, ReplicateError> {
        let policy = RetryPolicy::for_method(&method);
        let pool = match policy {
            RetryPolicy::IdempotentRead => &self.read,
            RetryPolicy::Mutating => &self.write,
        };
        let url = resolve_url(&self.base_url, target);
        let wire_body = options
            .body
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| options.multipart.as_ref().map(MultipartFile::summary));
        let mut retries = 0u32;

        loop {
            // Resolved per attempt so late-bound environment tokens are honored.
            let token = config::resolve_api_token(self.api_token.as_deref(), config::process_env)?;

            let mut request = pool
                .request(method.clone(), &url)
                .headers(options.headers.clone())
                .header(AUTHORIZATION, authorization_value(&token))
                .header(USER_AGENT, common::USER_AGENT);
            if !options.query.is_empty() {
                request = request.query(&options.query);
            }
            if let Some(body) = &options.body {
                request = request.json(body);
            } else if let Some(upload) = &options.multipart {
                request = request.multipart(upload.to_form()?);
            }

            loud_wire::log_request(request_id, method.as_str(), &url, wire_body.as_deref());
            debug!("{method} {url} (attempt {})", retries + 1);

            let failure = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    loud_wire::log_response_status(request_id, status.as_u16());

                    if !policy.retries_status(status) {
                        return check_response(response).await;
                    }
                    if retries < self.backoff.max_retries {
                        retries += 1;
                        let delay = self.backoff.delay_for_response(retries, response.headers());
                        drop(response);
                        warn!(
                            "{method} {url} returned {status}; retry {retries}/{} in {delay:?}",
                            self.backoff.max_retries
                        );
                        loud_wire::log_retry(request_id, retries, delay);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    read_error(response).await
                }
                Err(err) if policy.retries_error(&err) => {
                    if retries < self.backoff.max_retries {
                        retries += 1;
                        let delay = self.backoff.delay(retries);
                        warn!(
                            "{method} {url} failed: {err}; retry {retries}/{} in {delay:?}",
                            self.backoff.max_retries
                        );
                        loud_wire::log_retry(request_id, retries, delay);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    ReplicateError::Http(err)
                }
                Err(err) => return Err(ReplicateError::Http(err)),
            };

            return Err(if retries == 0 {
                failure
            } else {
                ReplicateError::RetriesExhausted {
                    attempts: retries + 1,
                    last: Box::new(failure),
                }
            });
        }
    }

    /// Sends a request and deserializes the successful JSON response.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        target: &str,
        options: &RequestOptions,
        context: &str,
    ) -> Result<T, ReplicateError> {
        let request_id = loud_wire::next_request_id();
        let response = self.send(request_id, method, target, options).await?;
        let body = response.text().await?;
        loud_wire::log_response_body(request_id, &body);
        deserialize_with_context(&body, context)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        target: &str,
        context: &str,
    ) -> Result<T, ReplicateError> {
        self.json(Method::GET, target, &RequestOptions::default(), context)
            .await
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        target: &str,
        body: Option<serde_json::Value>,
        context: &str,
    ) -> Result<T, ReplicateError> {
        let options = RequestOptions {
            body,
            ..RequestOptions::default()
        };
        self.json(Method::POST, target, &options, context).await
    }

    /// Sends a request and buffers the whole successful response.
    pub(crate) async fn buffered(
        &self,
        method: Method,
        target: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ReplicateError> {
        let request_id = loud_wire::next_request_id();
        let response = self.send(request_id, method, target, options).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        if let Ok(text) = std::str::from_utf8(&body) {
            loud_wire::log_response_body(request_id, text);
        }
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::new()
            .with_query("cursor", "abc")
            .with_json(serde_json::json!({"a": 1}))
            .with_header(
                reqwest::header::ACCEPT,
                HeaderValue::from_static("application/json"),
            );
        assert_eq!(options.query, vec![("cursor".to_string(), "abc".to_string())]);
        assert_eq!(options.body, Some(serde_json::json!({"a": 1})));
        assert_eq!(options.headers.len(), 1);
    }

    #[test]
    fn test_api_response_json_and_text() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"key": "whsec_abc"}"#),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["key"], "whsec_abc");
        assert!(response.text().unwrap().contains("whsec_abc"));
    }

    #[test]
    fn test_transport_builds_with_defaults() {
        let transport = Transport::new(TransportSettings {
            base_url: "http://localhost:1".to_string(),
            ..TransportSettings::default()
        })
        .unwrap();
        assert_eq!(transport.base_url(), "http://localhost:1");
    }
}
