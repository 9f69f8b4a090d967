//! The prediction entity and its lifecycle states.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Status of a prediction.
///
/// Predictions move `starting → processing → {succeeded | failed | canceled}`.
/// The server may jump straight from `starting` to a terminal state for
/// near-instant jobs. Terminal states never transition again.
///
/// # Unknown Status Handling
///
/// When the API returns a status value that this library doesn't recognize,
/// it is captured in the `Unknown` variant with the original string preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Unknown status (for forward compatibility).
    Unknown {
        /// The unrecognized status string from the API
        status_type: String,
    },
}

impl PredictionStatus {
    /// Returns `true` for `succeeded`, `failed`, and `canceled`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown { status_type } => status_type,
        }
    }

    /// Position in the lifecycle, used to detect regressions while polling.
    /// Unknown statuses have no rank.
    pub(crate) const fn rank(&self) -> Option<u8> {
        match self {
            Self::Starting => Some(0),
            Self::Processing => Some(1),
            Self::Succeeded | Self::Failed | Self::Canceled => Some(2),
            Self::Unknown { .. } => None,
        }
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PredictionStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PredictionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        Ok(match value.as_str() {
            "starting" => Self::Starting,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => {
                tracing::warn!(
                    "Encountered unknown PredictionStatus '{}'. \
                     The status will be preserved in the Unknown variant.",
                    value
                );
                Self::Unknown { status_type: value }
            }
        })
    }
}

/// Endpoints for operating on a prediction, fixed at creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionUrls {
    /// URL to fetch the prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<String>,
    /// URL to cancel the prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<String>,
    /// Server-sent event endpoint, present when created with streaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    /// Any other endpoints the API returns (e.g. `web`)
    #[serde(flatten)]
    pub other: HashMap<String, String>,
}

/// Metrics reported once a prediction completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    /// Seconds spent running the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predict_time: Option<f64>,
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

/// A prediction: one remote inference job and its current state.
///
/// A `Prediction` is a snapshot. It goes stale as soon as the job advances on
/// the server; refresh it with [`Predictions::reload`](crate::Predictions::reload)
/// or [`Predictions::wait`](crate::Predictions::wait).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Unique ID assigned by the server
    pub id: String,
    /// Model reference (`owner/name`), when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// ID of the model version that runs this prediction
    #[serde(default)]
    pub version: String,
    pub status: PredictionStatus,
    /// Input as submitted at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    /// Output; complete once `succeeded`, may grow while streaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error reported by the model; present when `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    /// Accumulated logs; grows while the prediction runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PredictionMetrics>,
    #[serde(default)]
    pub urls: PredictionUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly once, when the prediction reaches a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Prediction {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the error as text. Non-string errors are rendered as JSON.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Parses the most recent progress bar line from the logs.
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        self.logs.as_deref().and_then(Progress::parse)
    }
}

/// Progress of a running prediction, parsed from tqdm-style log lines
/// such as ` 45%|████▌     | 45/100 [00:03<00:04, 13.2it/s]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// Completed fraction in `[0, 1]`
    pub percentage: f64,
    pub current: u64,
    pub total: u64,
}

fn progress_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^\s*(?P<percentage>\d+)%\s*\|.+?\|\s*(?P<current>\d+)/(?P<total>\d+)")
                .ok()
        })
        .as_ref()
}

impl Progress {
    /// Returns the last progress line found in `logs`, if any.
    #[must_use]
    pub fn parse(logs: &str) -> Option<Self> {
        let pattern = progress_pattern()?;
        logs.lines().rev().find_map(|line| {
            let captures = pattern.captures(line)?;
            let percentage: u32 = captures["percentage"].parse().ok()?;
            Some(Self {
                percentage: f64::from(percentage) / 100.0,
                current: captures["current"].parse().ok()?,
                total: captures["total"].parse().ok()?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREDICTION_JSON: &str = r#"{
        "id": "ufawqhfynnddngldkgtslldrkq",
        "model": "replicate/hello-world",
        "version": "5c7d5dc6dd8bf75c1acaa8565735e7986bc5b66206b55cca93cb72c9bf15ccaa",
        "status": "succeeded",
        "input": {"text": "Alice"},
        "output": "hello Alice",
        "error": null,
        "logs": "",
        "metrics": {"predict_time": 0.0711, "total_time": 1.5},
        "urls": {
            "get": "https://api.replicate.com/v1/predictions/ufawqhfynnddngldkgtslldrkq",
            "cancel": "https://api.replicate.com/v1/predictions/ufawqhfynnddngldkgtslldrkq/cancel",
            "web": "https://replicate.com/p/ufawqhfynnddngldkgtslldrkq"
        },
        "created_at": "2022-04-26T22:13:06.224088Z",
        "started_at": "2022-04-26T22:13:06.280000Z",
        "completed_at": "2022-04-26T22:13:06.354000Z"
    }"#;

    #[test]
    fn test_prediction_deserialization() {
        let prediction: Prediction = serde_json::from_str(PREDICTION_JSON).unwrap();

        assert_eq!(prediction.id, "ufawqhfynnddngldkgtslldrkq");
        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert!(prediction.is_terminal());
        assert!(prediction.completed_at.is_some());
        assert_eq!(prediction.output, Some(serde_json::json!("hello Alice")));
        assert_eq!(prediction.error_message(), None);
        assert_eq!(prediction.metrics.as_ref().unwrap().predict_time, Some(0.0711));
        assert!(prediction.metrics.as_ref().unwrap().other.contains_key("total_time"));
        assert!(prediction.urls.cancel.as_deref().unwrap().ends_with("/cancel"));
        assert_eq!(prediction.urls.stream, None);
        assert!(prediction.urls.other.contains_key("web"));
    }

    #[test]
    fn test_minimal_prediction() {
        let prediction: Prediction =
            serde_json::from_str(r#"{"id": "p1", "status": "starting"}"#).unwrap();
        assert_eq!(prediction.version, "");
        assert!(!prediction.is_terminal());
        assert!(prediction.completed_at.is_none());
        assert_eq!(prediction.urls, PredictionUrls::default());
    }

    #[test]
    fn test_status_terminal_states() {
        assert!(!PredictionStatus::Starting.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
        assert!(PredictionStatus::Succeeded.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
        assert!(PredictionStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_unknown_status_preserved() {
        let status: PredictionStatus = serde_json::from_str(r#""queued""#).unwrap();
        assert!(status.is_unknown());
        assert!(!status.is_terminal());
        assert_eq!(status.rank(), None);
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""queued""#);
    }

    #[test]
    fn test_status_rank_orders_lifecycle() {
        assert!(PredictionStatus::Starting.rank() < PredictionStatus::Processing.rank());
        assert!(PredictionStatus::Processing.rank() < PredictionStatus::Canceled.rank());
    }

    #[test]
    fn test_error_message_variants() {
        let mut prediction: Prediction =
            serde_json::from_str(r#"{"id": "p1", "status": "failed", "error": "OOM"}"#).unwrap();
        assert_eq!(prediction.error_message().as_deref(), Some("OOM"));

        prediction.error = Some(serde_json::json!({"code": "E1001"}));
        assert!(prediction.error_message().unwrap().contains("E1001"));
    }

    #[test]
    fn test_progress_from_logs() {
        let logs = "Using seed: 42\n  0%|          | 0/50 [00:00<?, ?it/s]\n 48%|████▊     | 24/50 [00:02<00:02, 11.1it/s]\n";
        let progress = Progress::parse(logs).unwrap();
        assert_eq!(progress.current, 24);
        assert_eq!(progress.total, 50);
        assert!((progress.percentage - 0.48).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_absent() {
        assert_eq!(Progress::parse("loading weights\nready"), None);

        let prediction: Prediction =
            serde_json::from_str(r#"{"id": "p1", "status": "processing", "logs": ""}"#).unwrap();
        assert_eq!(prediction.progress(), None);
    }
}
