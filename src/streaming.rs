//! Server-sent events emitted by streaming predictions.
//!
//! A prediction created with streaming enabled exposes `urls.stream`. Opening
//! it with [`Predictions::stream`](crate::Predictions::stream) yields
//! [`ServerSentEvent`]s until the server sends `done`.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use replicate_rs::{Client, EventKind, PredictionRequest};
//!
//! # async fn example() -> Result<(), replicate_rs::ReplicateError> {
//! let client = Client::new()?;
//! let request = PredictionRequest::new(
//!     "02e509c789964a7ea8736978a43525956ef40397be9033abf9fd2badfe68c9e3",
//!     serde_json::json!({"prompt": "write a sonnet about camelids"}),
//! )
//! .with_stream(true);
//!
//! let prediction = client.predictions().create(request).await?;
//! let mut events = client.predictions().stream(&prediction)?;
//! while let Some(event) = events.next().await {
//!     let event = event?;
//!     if event.event == EventKind::Output {
//!         print!("{event}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::errors::ReplicateError;
use futures_util::stream::BoxStream;

/// The `event:` field of a server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventKind {
    /// No `event:` field was sent.
    Message,
    /// A chunk of model output.
    Output,
    /// A chunk of prediction logs.
    Logs,
    /// The prediction failed; surfaced as [`ReplicateError::Stream`].
    Error,
    /// The stream is complete; ends the stream.
    Done,
    /// An event name this library does not recognize.
    Unknown(String),
}

impl EventKind {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | "message" => Self::Message,
            "output" => Self::Output,
            "logs" => Self::Logs,
            "error" => Self::Error,
            "done" => Self::Done,
            other => Self::Unknown(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Output => "output",
            Self::Logs => "logs",
            Self::Error => "error",
            Self::Done => "done",
            Self::Unknown(name) => name,
        }
    }
}

/// A single decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSentEvent {
    pub event: EventKind,
    /// Data lines joined with `\n`
    pub data: String,
    /// The last event ID seen on this stream
    pub id: String,
    /// Reconnection time requested by the server, in milliseconds
    pub retry: Option<u64>,
}

/// Displays output data; every other event kind displays as empty.
impl std::fmt::Display for ServerSentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.event == EventKind::Output {
            f.write_str(&self.data)
        } else {
            Ok(())
        }
    }
}

/// A boxed stream of prediction events.
pub type EventStream<'a> = BoxStream<'a, Result<ServerSentEvent, ReplicateError>>;
