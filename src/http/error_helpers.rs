//! Error normalization for HTTP responses.
//!
//! Every failed response, whatever its body looks like, becomes one
//! [`ReplicateError`] carrying a human-readable detail message.

use crate::errors::{ApiError, ReplicateError};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Maximum characters to include from a body in parse-error context.
const ERROR_BODY_PREVIEW_LENGTH: usize = 200;

/// Returns the response if its status is successful, or the normalized error.
///
/// # Errors
///
/// Returns [`ReplicateError::NotFound`] for 404 and [`ReplicateError::Api`]
/// for every other status in `[400, 600)`.
pub async fn check_response(response: Response) -> Result<Response, ReplicateError> {
    if response.status().is_client_error() || response.status().is_server_error() {
        Err(read_error(response).await)
    } else {
        Ok(response)
    }
}

/// Consumes a failed response and normalizes it.
pub async fn read_error(response: Response) -> ReplicateError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error body: {e}"));
    normalize_error(status, &body)
}

/// Builds the normalized error for a status code and raw body.
///
/// The JSON `detail` field is used as the message when present. A
/// non-string `detail` (validation error lists) is rendered as compact JSON.
/// Otherwise the message falls back to the status code and reason phrase.
pub fn normalize_error(status: StatusCode, body: &str) -> ReplicateError {
    let problem = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .filter(serde_json::Value::is_object);

    let field = |name: &str| {
        problem
            .as_ref()
            .and_then(|p| p.get(name))
            .and_then(serde_json::Value::as_str)
            .map(String::from)
    };

    let detail = match problem.as_ref().and_then(|p| p.get("detail")) {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(serde_json::Value::Null) | None => status_message(status),
        Some(other) => other.to_string(),
    };

    let error = ApiError {
        status: status.as_u16(),
        detail,
        title: field("title"),
        error_type: field("type"),
        instance: field("instance"),
    };

    if status == StatusCode::NOT_FOUND {
        ReplicateError::NotFound(error)
    } else {
        ReplicateError::Api(error)
    }
}

fn status_message(status: StatusCode) -> String {
    format!(
        "HTTP error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

/// Deserializes a response body, logging a preview of the body on failure.
pub fn deserialize_with_context<T: DeserializeOwned>(
    body: &str,
    context: &str,
) -> Result<T, ReplicateError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::warn!(
            "Failed to parse {context}: {e} | Body: {}",
            truncate_for_context(body, ERROR_BODY_PREVIEW_LENGTH)
        );
        ReplicateError::Json(e)
    })
}

/// Truncates a string to specified length, adding "..." if truncated.
///
/// Slices on character boundaries so multi-byte UTF-8 never panics.
pub fn truncate_for_context(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let truncate_at = s
            .char_indices()
            .take_while(|(i, c)| i + c.len_utf8() <= max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..truncate_at])
    }
}
