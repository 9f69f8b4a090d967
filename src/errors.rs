use std::time::Duration;
use thiserror::Error;

/// A normalized error response from the Replicate API.
///
/// Replicate returns problem details (RFC 7807) for most failures, but proxies
/// and load balancers in front of it can answer with HTML or an empty body.
/// Both shapes are folded into this one type: `detail` is always populated,
/// either from the JSON `detail` field or from the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code (e.g., 404, 422, 500)
    pub status: u16,
    /// Human-readable explanation of the failure
    pub detail: String,
    /// Short summary from the problem document, if the server sent one
    pub title: Option<String>,
    /// URI identifying the error type, if the server sent one
    pub error_type: Option<String>,
    /// URI identifying this occurrence, if the server sent one
    pub instance: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Defines errors that can occur when interacting with the Replicate API.
///
/// # Example: Handling API Errors
///
/// ```ignore
/// match client.predictions().get("abc123").await {
///     Err(ReplicateError::NotFound(err)) => {
///         tracing::warn!("prediction is gone: {}", err.detail);
///     }
///     Err(ReplicateError::Api(err)) => {
///         tracing::error!("API error {}: {}", err.status, err.detail);
///     }
///     // ...
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplicateError {
    /// No API token could be resolved when the request was made.
    #[error(
        "No API token provided. Set the REPLICATE_API_TOKEN environment variable \
         or configure the client with `ClientBuilder::api_token`."
    )]
    Auth,
    /// The caller passed input that can never produce a valid request.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// API error normalized from a 4xx/5xx response.
    #[error("API error (HTTP {}): {}", .0.status, .0.detail)]
    Api(ApiError),
    /// The requested resource does not exist (HTTP 404).
    #[error("Not found: {}", .0.detail)]
    NotFound(ApiError),
    /// The connection failed before a response was received.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    /// Every permitted attempt failed with a retryable error.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total number of requests sent, including the first
        attempts: u32,
        /// The error produced by the final attempt
        last: Box<ReplicateError>,
    },
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// A `wait` call did not observe a terminal state within its timeout.
    #[error("Timed out after {0:?} waiting for prediction to finish")]
    Timeout(Duration),
    /// A `wait` call was stopped through its cancellation token.
    #[error("Waiting for prediction was cancelled by the caller")]
    WaitCancelled,
    /// The model itself failed while running the prediction.
    #[error("Prediction {prediction_id} failed: {message}")]
    Model {
        prediction_id: String,
        message: String,
    },
    /// Streaming was requested for a prediction created without `stream: true`.
    #[error("Prediction {prediction_id} has no stream URL; create it with streaming enabled")]
    StreamUnavailable { prediction_id: String },
    /// The server reported an error through the event stream, or answered
    /// a stream request with something other than an event stream.
    #[error("Stream error: {0}")]
    Stream(String),
    /// Failed to build the HTTP client or its runtime.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ReplicateError {
    /// Returns the normalized API error for `Api` and `NotFound` variants.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) | Self::NotFound(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status code, if this error came from a response.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RetriesExhausted { last, .. } => last.status_code(),
            _ => self.api_error().map(|err| err.status),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for failures of the transport itself: the connection
    /// failed, or the retry budget was spent without a usable response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RetriesExhausted { .. })
    }

    /// Returns `true` if this error is likely transient and the request may succeed on retry.
    ///
    /// The transport already retries these internally according to the
    /// method's policy; this helper is for callers layering their own retry
    /// loop on top (e.g. around `run`).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::Api(err) => err.status == 429 || err.status >= 500,
            Self::RetriesExhausted { .. } | Self::Timeout(_) => true,
            Self::Auth
            | Self::Validation(_)
            | Self::NotFound(_)
            | Self::Json(_)
            | Self::Utf8(_)
            | Self::WaitCancelled
            | Self::Model { .. }
            | Self::StreamUnavailable { .. }
            | Self::Stream(_)
            | Self::ClientBuild(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, detail: &str) -> ApiError {
        ApiError {
            status,
            detail: detail.to_string(),
            title: None,
            error_type: None,
            instance: None,
        }
    }

    #[test]
    fn test_api_error_display() {
        let error = ReplicateError::Api(api_error(422, "Invalid version"));
        let display = error.to_string();
        assert!(display.contains("422"));
        assert!(display.contains("Invalid version"));
    }

    #[test]
    fn test_not_found_exposes_api_error() {
        let error = ReplicateError::NotFound(api_error(404, "Not found."));
        assert!(error.is_not_found());
        assert_eq!(error.status_code(), Some(404));
        assert_eq!(error.api_error().map(|e| e.detail.as_str()), Some("Not found."));
    }

    #[test]
    fn test_auth_error_mentions_env_var() {
        assert!(ReplicateError::Auth.to_string().contains("REPLICATE_API_TOKEN"));
    }

    #[test]
    fn test_retries_exhausted_reports_last_status() {
        let error = ReplicateError::RetriesExhausted {
            attempts: 6,
            last: Box::new(ReplicateError::Api(api_error(503, "Service Unavailable"))),
        };
        assert!(error.is_transport());
        assert_eq!(error.status_code(), Some(503));
        assert!(error.to_string().contains("6 attempts"));
    }

    #[test]
    fn test_is_retryable_api_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(
                ReplicateError::Api(api_error(status, "x")).is_retryable(),
                "{status} should be retryable"
            );
        }
        for status in [400, 401, 403, 422] {
            assert!(
                !ReplicateError::Api(api_error(status, "x")).is_retryable(),
                "{status} should NOT be retryable"
            );
        }
    }

    #[test]
    fn test_permanent_errors_not_retryable() {
        assert!(!ReplicateError::Auth.is_retryable());
        assert!(!ReplicateError::Validation("cursor cannot be None".into()).is_retryable());
        assert!(!ReplicateError::NotFound(api_error(404, "x")).is_retryable());
        assert!(!ReplicateError::WaitCancelled.is_retryable());
    }

    #[test]
    fn test_json_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let error: ReplicateError = json_err.into();
        assert!(error.to_string().contains("JSON deserialization error"));
        assert!(error.api_error().is_none());
    }

    #[test]
    fn test_timeout_display() {
        let error = ReplicateError::Timeout(Duration::from_secs(30));
        assert!(error.to_string().contains("30s"));
        assert!(error.is_retryable());
    }
}
