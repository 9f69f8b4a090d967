//! The Predictions namespace: create, inspect, cancel, wait on, list and
//! stream prediction jobs.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::http::common::Endpoint;
use crate::http::sse_parser::parse_sse_stream;
use crate::http::loud_wire;
use crate::http::transport::RequestOptions;
use crate::pagination::{Cursor, Page};
use crate::prediction::{Prediction, PredictionStatus};
use crate::streaming::EventStream;
use crate::types::VersionRef;
use async_stream::try_stream;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Method;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Events that trigger a webhook delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEvent {
    Start,
    Output,
    Logs,
    Completed,
}

/// Parameters for creating a prediction.
///
/// # Example
///
/// ```
/// use replicate_rs::{PredictionRequest, WebhookEvent};
///
/// let request = PredictionRequest::new("abc123", serde_json::json!({"prompt": "x"}))
///     .with_webhook("https://example.com/hook")
///     .with_webhook_events_filter([WebhookEvent::Completed]);
/// ```
#[derive(Debug)]
pub struct PredictionRequest {
    version: Option<VersionRef>,
    input: Result<serde_json::Value, serde_json::Error>,
    stream: Option<bool>,
    webhook: Option<String>,
    webhook_completed: Option<String>,
    webhook_events_filter: Option<Vec<WebhookEvent>>,
}

impl PredictionRequest {
    /// Creates a request to run `input` against a model version.
    ///
    /// The version is an id string or a fetched [`Version`](crate::Version).
    pub fn new(version: impl Into<VersionRef>, input: impl Serialize) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::from_input(input)
        }
    }

    /// Creates a request without a version, for endpoints that pick the
    /// version themselves (official models and deployments).
    pub fn from_input(input: impl Serialize) -> Self {
        Self {
            version: None,
            input: serde_json::to_value(input),
            stream: None,
            webhook: None,
            webhook_completed: None,
            webhook_events_filter: None,
        }
    }

    /// Requests a server-sent event endpoint in `urls.stream`.
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// URL that receives a POST with prediction updates.
    #[must_use]
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(url.into());
        self
    }

    /// URL that receives a POST once the prediction completes.
    #[must_use]
    pub fn with_webhook_completed(mut self, url: impl Into<String>) -> Self {
        self.webhook_completed = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_webhook_events_filter(
        mut self,
        events: impl IntoIterator<Item = WebhookEvent>,
    ) -> Self {
        self.webhook_events_filter = Some(events.into_iter().collect());
        self
    }

    #[must_use]
    pub const fn version(&self) -> Option<&VersionRef> {
        self.version.as_ref()
    }

    /// Builds the JSON body. `include_version` is false for endpoints
    /// addressed by model or deployment name.
    pub(crate) fn into_body(
        self,
        include_version: bool,
    ) -> Result<serde_json::Value, ReplicateError> {
        let mut body = serde_json::Map::new();

        if include_version {
            let version = self
                .version
                .as_ref()
                .ok_or_else(|| ReplicateError::Validation("version is required".to_string()))?;
            body.insert("version".into(), version.validated_id()?.into());
        }
        body.insert("input".into(), self.input?);
        if let Some(stream) = self.stream {
            body.insert("stream".into(), stream.into());
        }
        if let Some(webhook) = self.webhook {
            body.insert("webhook".into(), webhook.into());
        }
        if let Some(webhook_completed) = self.webhook_completed {
            body.insert("webhook_completed".into(), webhook_completed.into());
        }
        if let Some(events) = self.webhook_events_filter {
            body.insert("webhook_events_filter".into(), serde_json::to_value(events)?);
        }

        Ok(serde_json::Value::Object(body))
    }
}

/// Controls a [`Predictions::wait`] call.
///
/// Leaving `interval` unset uses the client's poll interval. Without a
/// timeout or cancellation token the wait lasts until the prediction
/// reaches a terminal state.
#[derive(Clone, Debug, Default)]
pub struct WaitOptions {
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Operations on predictions. Obtained from [`Client::predictions`].
#[derive(Debug, Clone, Copy)]
pub struct Predictions<'a> {
    client: &'a Client,
}

impl<'a> Predictions<'a> {
    pub(crate) const fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Creates a prediction for a model version.
    ///
    /// The returned prediction is usually `starting`; near-instant jobs may
    /// already be terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The version is missing or empty ([`ReplicateError::Validation`])
    /// - The input cannot be serialized
    /// - The API rejects the request
    pub async fn create(&self, request: PredictionRequest) -> Result<Prediction, ReplicateError> {
        let body = request.into_body(true)?;
        debug!("Creating prediction: version={}", body["version"]);
        self.create_at(&Endpoint::CreatePrediction.path(), body)
            .await
    }

    /// Posts a prediction body to a creation endpoint.
    pub(crate) async fn create_at(
        &self,
        target: &str,
        body: serde_json::Value,
    ) -> Result<Prediction, ReplicateError> {
        let prediction: Prediction = self
            .client
            .transport
            .post_json(target, Some(body), "Prediction from create")
            .await?;

        debug!(
            "Prediction created: ID={}, status={}",
            prediction.id, prediction.status
        );
        Ok(prediction)
    }

    /// Fetches the current snapshot of a prediction.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::NotFound`] if no prediction has this id.
    pub async fn get(&self, id: &str) -> Result<Prediction, ReplicateError> {
        validate_id("prediction", id)?;
        debug!("Getting prediction: ID={id}");
        self.fetch(&Endpoint::GetPrediction { id }.path()).await
    }

    async fn fetch(&self, target: &str) -> Result<Prediction, ReplicateError> {
        let prediction: Prediction = self
            .client
            .transport
            .get_json(target, "Prediction from get")
            .await?;

        debug!(
            "Retrieved prediction: ID={}, status={}",
            prediction.id, prediction.status
        );
        Ok(prediction)
    }

    /// Refreshes `prediction` in place from its `get` URL.
    ///
    /// # Errors
    ///
    /// On failure the prediction is left unchanged.
    pub async fn reload(&self, prediction: &mut Prediction) -> Result<(), ReplicateError> {
        let target = match &prediction.urls.get {
            Some(url) => url.clone(),
            None => Endpoint::GetPrediction { id: &prediction.id }.path(),
        };
        *prediction = self.fetch(&target).await?;
        Ok(())
    }

    /// Cancels a prediction and returns the updated snapshot.
    ///
    /// Cancelling a prediction that already finished is a no-op on the
    /// server; the response carries its terminal state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::NotFound`] if no prediction has this id.
    pub async fn cancel(&self, id: &str) -> Result<Prediction, ReplicateError> {
        validate_id("prediction", id)?;
        self.cancel_at(&Endpoint::CancelPrediction { id }.path())
            .await
    }

    /// Cancels `prediction` through its `cancel` URL and updates it in place.
    ///
    /// # Errors
    ///
    /// On failure the prediction is left unchanged.
    pub async fn cancel_prediction(
        &self,
        prediction: &mut Prediction,
    ) -> Result<(), ReplicateError> {
        let target = match &prediction.urls.cancel {
            Some(url) => url.clone(),
            None => Endpoint::CancelPrediction { id: &prediction.id }.path(),
        };
        *prediction = self.cancel_at(&target).await?;
        Ok(())
    }

    async fn cancel_at(&self, target: &str) -> Result<Prediction, ReplicateError> {
        debug!("Cancelling prediction: {target}");
        let prediction: Prediction = self
            .client
            .transport
            .post_json(target, None, "Prediction from cancel")
            .await?;

        debug!(
            "Cancel returned: ID={}, status={}",
            prediction.id, prediction.status
        );
        Ok(prediction)
    }

    /// Polls until `prediction` reaches a terminal state.
    ///
    /// Each poll replaces `prediction` with the latest snapshot, so on return
    /// it holds the final status, output, logs and `completed_at`. An already
    /// terminal prediction returns immediately without a request.
    ///
    /// Dropping the returned future stops polling.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A poll fails after transport retries ([`ReplicateError::RetriesExhausted`])
    ///   or with a non-retryable API error; polling stops at the first failure
    /// - The timeout elapses ([`ReplicateError::Timeout`])
    /// - The cancellation token fires ([`ReplicateError::WaitCancelled`])
    ///
    /// In every error case `prediction` keeps the last snapshot fetched.
    pub async fn wait(
        &self,
        prediction: &mut Prediction,
        options: WaitOptions,
    ) -> Result<(), ReplicateError> {
        let interval = options.interval.unwrap_or(self.client.poll_interval);
        let cancel = options.cancel;
        let timeout = options.timeout;

        let cancelled = async {
            match &cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let poll = async {
            let poll = self.poll_until_terminal(prediction, interval);
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, poll).await {
                    Ok(result) => result,
                    Err(_) => Err(ReplicateError::Timeout(limit)),
                },
                None => poll.await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => {
                debug!("Wait cancelled by caller");
                Err(ReplicateError::WaitCancelled)
            }
            result = poll => result,
        }
    }

    async fn poll_until_terminal(
        &self,
        prediction: &mut Prediction,
        interval: Duration,
    ) -> Result<(), ReplicateError> {
        while !prediction.is_terminal() {
            tokio::time::sleep(interval).await;

            let previous = prediction.status.clone();
            self.reload(prediction).await?;

            if let (Some(before), Some(after)) = (previous.rank(), prediction.status.rank())
                && after < before
            {
                warn!(
                    "Prediction {} went from {previous} back to {}; continuing to poll",
                    prediction.id, prediction.status
                );
            }
        }
        debug!(
            "Prediction {} finished: status={}",
            prediction.id, prediction.status
        );
        Ok(())
    }

    /// Lists the first page of your predictions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Page<Prediction>, ReplicateError> {
        self.list_from(Cursor::Start).await
    }

    /// Lists predictions starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for [`Cursor::Exhausted`]
    /// (e.g. `Cursor::from(page.next)` on the last page).
    pub async fn list_from(
        &self,
        cursor: impl Into<Cursor>,
    ) -> Result<Page<Prediction>, ReplicateError> {
        let target = cursor.into().target(Endpoint::ListPredictions.path())?;
        debug!("Listing predictions: {target}");
        self.client
            .transport
            .get_json(&target, "Page<Prediction> from list")
            .await
    }

    /// Polls `prediction` and yields each new element of its output as the
    /// output array grows. A non-array output is yielded once, when it first
    /// appears.
    ///
    /// The stream ends when the prediction reaches a terminal state, or
    /// fails with [`ReplicateError::Model`] if the prediction fails.
    pub fn output_stream(
        &self,
        prediction: Prediction,
    ) -> BoxStream<'a, Result<serde_json::Value, ReplicateError>> {
        let predictions = *self;
        let interval = self.client.poll_interval;

        try_stream! {
            let mut prediction = prediction;
            let mut seen = 0usize;

            loop {
                if prediction.status == PredictionStatus::Failed {
                    Err::<(), _>(model_error(&prediction))?;
                }

                let items = output_items(prediction.output.as_ref());
                let fresh: Vec<_> = items.into_iter().skip(seen).collect();
                seen += fresh.len();
                for item in fresh {
                    yield item;
                }

                if prediction.is_terminal() {
                    break;
                }
                tokio::time::sleep(interval).await;
                predictions.reload(&mut prediction).await?;
            }
        }
        .boxed()
    }

    /// Opens the server-sent event stream of a prediction created with
    /// streaming enabled.
    ///
    /// The connection is made when the stream is first polled.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::StreamUnavailable`] if the prediction has no
    /// `stream` URL. The stream yields [`ReplicateError::Stream`] if the
    /// server answers with anything other than `text/event-stream`.
    pub fn stream(&self, prediction: &Prediction) -> Result<EventStream<'static>, ReplicateError> {
        let url = prediction
            .urls
            .stream
            .clone()
            .ok_or_else(|| ReplicateError::StreamUnavailable {
                prediction_id: prediction.id.clone(),
            })?;
        let transport = self.client.transport.clone();
        debug!("Opening event stream for prediction {}", prediction.id);

        let stream = try_stream! {
            let options = RequestOptions::new()
                .with_header(ACCEPT, HeaderValue::from_static("text/event-stream"))
                .with_header(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            let request_id = loud_wire::next_request_id();
            let response = transport.send(request_id, Method::GET, &url, &options).await?;
            ensure_event_stream(response.headers())?;

            let events = parse_sse_stream(response.bytes_stream(), request_id);
            futures_util::pin_mut!(events);
            while let Some(event) = events.next().await {
                yield event?;
            }
        };
        Ok(stream.boxed())
    }
}

/// Compares the media type only; parameters after `;` are ignored.
fn ensure_event_stream(headers: &HeaderMap) -> Result<(), ReplicateError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case("text/event-stream") {
        Ok(())
    } else {
        Err(ReplicateError::Stream(format!(
            "expected content type text/event-stream, got {content_type:?}"
        )))
    }
}

pub(crate) fn validate_id(kind: &str, id: &str) -> Result<(), ReplicateError> {
    if id.trim().is_empty() {
        Err(ReplicateError::Validation(format!(
            "{kind} id must not be empty"
        )))
    } else {
        Ok(())
    }
}

/// Builds the error for a prediction that finished in `failed`.
pub(crate) fn model_error(prediction: &Prediction) -> ReplicateError {
    ReplicateError::Model {
        prediction_id: prediction.id.clone(),
        message: prediction
            .error_message()
            .unwrap_or_else(|| "prediction failed without an error message".to_string()),
    }
}

fn output_items(output: Option<&serde_json::Value>) -> Vec<serde_json::Value> {
    match output {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_with_all_options() {
        let body = PredictionRequest::new("abc123", json!({"prompt": "x"}))
            .with_stream(true)
            .with_webhook("https://example.com/hook")
            .with_webhook_completed("https://example.com/done")
            .with_webhook_events_filter([WebhookEvent::Start, WebhookEvent::Completed])
            .into_body(true)
            .unwrap();

        assert_eq!(
            body,
            json!({
                "version": "abc123",
                "input": {"prompt": "x"},
                "stream": true,
                "webhook": "https://example.com/hook",
                "webhook_completed": "https://example.com/done",
                "webhook_events_filter": ["start", "completed"]
            })
        );
    }

    #[test]
    fn test_request_body_minimal() {
        let body = PredictionRequest::new("abc123", json!({"prompt": "x"}))
            .into_body(true)
            .unwrap();
        assert_eq!(body, json!({"version": "abc123", "input": {"prompt": "x"}}));
    }

    #[test]
    fn test_request_body_accepts_serializable_input() {
        #[derive(Serialize)]
        struct Input {
            text: &'static str,
        }

        let body = PredictionRequest::new("v", Input { text: "Alice" })
            .into_body(true)
            .unwrap();
        assert_eq!(body["input"], json!({"text": "Alice"}));
    }

    #[test]
    fn test_empty_version_rejected() {
        let err = PredictionRequest::new("", json!({}))
            .into_body(true)
            .unwrap_err();
        assert!(matches!(err, ReplicateError::Validation(_)));
    }

    #[test]
    fn test_missing_version_rejected_only_when_required() {
        let err = PredictionRequest::from_input(json!({}))
            .into_body(true)
            .unwrap_err();
        assert!(matches!(err, ReplicateError::Validation(_)));

        let body = PredictionRequest::from_input(json!({"prompt": "x"}))
            .into_body(false)
            .unwrap();
        assert!(body.get("version").is_none());
    }

    #[test]
    fn test_output_items() {
        assert!(output_items(None).is_empty());
        assert!(output_items(Some(&json!(null))).is_empty());
        assert_eq!(output_items(Some(&json!(["a", "b"]))), vec![json!("a"), json!("b")]);
        assert_eq!(output_items(Some(&json!("done"))), vec![json!("done")]);
    }

    #[test]
    fn test_model_error_uses_prediction_error() {
        let prediction: Prediction =
            serde_json::from_str(r#"{"id": "p1", "status": "failed", "error": "CUDA OOM"}"#)
                .unwrap();
        match model_error(&prediction) {
            ReplicateError::Model {
                prediction_id,
                message,
            } => {
                assert_eq!(prediction_id, "p1");
                assert_eq!(message, "CUDA OOM");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wait_options_builder() {
        let token = CancellationToken::new();
        let options = WaitOptions::new()
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(1))
            .with_cancellation(token.clone());
        assert_eq!(options.interval, Some(Duration::from_millis(10)));
        assert_eq!(options.timeout, Some(Duration::from_secs(1)));
        token.cancel();
        assert!(options.cancel.unwrap().is_cancelled());
    }

    #[test]
    fn test_event_stream_content_type() {
        let with_type = |value: &'static str| {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
            headers
        };
        assert!(ensure_event_stream(&with_type("text/event-stream")).is_ok());
        assert!(ensure_event_stream(&with_type("text/event-stream; charset=utf-8")).is_ok());
        assert!(ensure_event_stream(&with_type("Text/Event-Stream")).is_ok());
        assert!(matches!(
            ensure_event_stream(&with_type("application/json")),
            Err(ReplicateError::Stream(_))
        ));
        assert!(matches!(
            ensure_event_stream(&HeaderMap::new()),
            Err(ReplicateError::Stream(_))
        ));
    }
}
