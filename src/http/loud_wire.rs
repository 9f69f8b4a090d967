//! Wire-level debugging via the `LOUD_WIRE` environment variable.
//!
//! When `LOUD_WIRE` is set to any value, prints raw JSON of API requests,
//! responses and stream events to stderr with pretty formatting and colors.
//!
//! ```bash
//! LOUD_WIRE=1 cargo test --test predictions_tests
//! ```
//!
//! - Green `>>>` for outgoing requests
//! - Red `<<<` for incoming responses
//! - Blue for server-sent events
//!
//! Inline `data:` URIs (base64 file inputs) are truncated to keep output
//! readable. The `Authorization` header is never printed.

use super::error_helpers::truncate_for_context;
use colored::Colorize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

static ENABLED: OnceLock<bool> = OnceLock::new();

/// Maximum length of a `data:` URI before truncation.
const TRUNCATE_THRESHOLD: usize = 100;

/// Maximum length of a non-JSON body before truncation.
const RAW_BODY_LIMIT: usize = 1000;

/// Check if LOUD_WIRE debugging is enabled.
///
/// Cached after the first check, so `LOUD_WIRE` must be set before the
/// first request is made.
#[must_use]
pub fn is_enabled() -> bool {
    *ENABLED.get_or_init(|| std::env::var("LOUD_WIRE").is_ok())
}

/// Get the next request ID for correlating requests with responses.
#[must_use]
pub fn next_request_id() -> usize {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Walks the JSON tree and shortens inline `data:` URIs.
fn truncate_data_uris(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) if s.starts_with("data:") && s.len() > TRUNCATE_THRESHOLD => {
            *s = truncate_for_context(s, TRUNCATE_THRESHOLD);
        }
        serde_json::Value::Object(map) => {
            for val in map.values_mut() {
                truncate_data_uris(val);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                truncate_data_uris(item);
            }
        }
        _ => {}
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn prefix(request_id: usize) -> String {
    format!(
        "{} {} {}",
        "[LOUD_WIRE]".bold(),
        timestamp().dimmed(),
        format!("[REQ#{request_id}]").cyan()
    )
}

/// Prints a body as colored JSON when it parses, raw (truncated) otherwise.
fn print_body(prefix: &str, label: &str, body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(mut parsed) => {
            truncate_data_uris(&mut parsed);
            eprintln!("{prefix} {label}:");
            let rendered = colored_json::to_colored_json_auto(&parsed)
                .ok()
                .or_else(|| serde_json::to_string_pretty(&parsed).ok())
                .unwrap_or_default();
            for line in rendered.lines() {
                eprintln!("{prefix} {line}");
            }
        }
        Err(_) => {
            let truncated = truncate_for_context(body, RAW_BODY_LIMIT);
            eprintln!("{prefix} {label}: {truncated}");
        }
    }
}

/// Log an outgoing HTTP request.
pub fn log_request(request_id: usize, method: &str, url: &str, body: Option<&str>) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    eprintln!("{prefix} {} {method} {url}", ">>>".green().bold());

    if let Some(body) = body {
        print_body(&prefix, &"Body".green().to_string(), body);
    }
}

/// Log a retry decision for a request.
pub fn log_retry(request_id: usize, attempt: u32, delay: std::time::Duration) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    eprintln!(
        "{prefix} {} attempt {attempt} in {delay:?}",
        "RETRY".yellow().bold()
    );
}

/// Log an incoming HTTP response status.
pub fn log_response_status(request_id: usize, status: u16) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    let status_text = if status < 300 {
        format!("{status} OK").green()
    } else {
        format!("{status} ERROR").red()
    };

    eprintln!("{prefix} {} {status_text}", "<<<".red().bold());
}

/// Log an incoming HTTP response body.
pub fn log_response_body(request_id: usize, body: &str) {
    if !is_enabled() {
        return;
    }

    print_body(&prefix(request_id), &"Response".red().to_string(), body);
}

/// Log a decoded server-sent event.
pub fn log_sse_event(request_id: usize, event: &str, data: &str) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    let label = format!("SSE {event}").blue().bold();
    eprintln!("{prefix} {label}: {}", truncate_for_context(data, RAW_BODY_LIMIT));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_data_uri() {
        let mut value = serde_json::json!({"image": "data:image/png;base64,AAAA"});
        truncate_data_uris(&mut value);
        assert_eq!(value["image"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_truncate_long_data_uri() {
        let uri = format!("data:image/png;base64,{}", "A".repeat(300));
        let mut value = serde_json::json!({"input": {"image": uri}});
        truncate_data_uris(&mut value);

        let result = value["input"]["image"].as_str().unwrap();
        assert!(result.ends_with("..."));
        assert_eq!(result.len(), TRUNCATE_THRESHOLD + 3);
    }

    #[test]
    fn test_truncate_preserves_prompts() {
        let prompt = "a studio photo of a rainbow colored corgi ".repeat(20);
        let mut value = serde_json::json!({"input": {"prompt": prompt.clone()}});
        truncate_data_uris(&mut value);
        assert_eq!(value["input"]["prompt"], prompt);
    }

    #[test]
    fn test_truncate_inside_arrays() {
        let uri = format!("data:audio/wav;base64,{}", "B".repeat(200));
        let mut value = serde_json::json!({"output": [uri, "https://example.com/x.png"]});
        truncate_data_uris(&mut value);

        assert!(value["output"][0].as_str().unwrap().ends_with("..."));
        assert_eq!(value["output"][1], "https://example.com/x.png");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 20, "Timestamp should be 20 chars: {ts}");
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }

    #[test]
    fn test_request_id_increments() {
        let id1 = next_request_id();
        let id2 = next_request_id();
        assert!(id2 > id1);
    }
}
