//! A Rust client for the Replicate prediction API.
//!
//! Predictions are asynchronous jobs run against versioned models. This crate
//! creates, polls, cancels, lists and streams them, with a non-blocking
//! [`Client`] and a [`blocking::Client`] that share one request algorithm:
//! the same retry policy, error normalization, and polling loop.
//!
//! # Quick start
//!
//! ```no_run
//! use replicate_rs::{Client, PredictionRequest, WaitOptions};
//!
//! # async fn example() -> Result<(), replicate_rs::ReplicateError> {
//! // Reads REPLICATE_API_TOKEN when the first request is sent.
//! let client = Client::new()?;
//!
//! let mut prediction = client
//!     .predictions()
//!     .create(PredictionRequest::new(
//!         "5c7d5dc6dd8bf75c1acaa8565735e7986bc5b66206b55cca93cb72c9bf15ccaa",
//!         serde_json::json!({"text": "Alice"}),
//!     ))
//!     .await?;
//!
//! client
//!     .predictions()
//!     .wait(&mut prediction, WaitOptions::default())
//!     .await?;
//! println!("{} -> {:?}", prediction.status, prediction.output);
//! # Ok(())
//! # }
//! ```
//!
//! # Retries
//!
//! `GET`, `HEAD` and `OPTIONS` requests are retried on 429 and on the 5xx
//! statuses a proxy or overloaded server returns. Mutating requests are only
//! retried on 429, since a 5xx may mean the side effect already happened.
//! See [`RetryPolicy`].
//!
//! # Debugging
//!
//! Set `LOUD_WIRE=1` to print every request, response and stream event to
//! stderr. The API token is never printed.

pub mod blocking;
mod client;
mod collections;
mod config;
mod deployments;
mod errors;
mod files;
pub(crate) mod http;
mod models;
mod pagination;
mod prediction;
mod predictions;
mod run;
mod streaming;
mod types;
mod webhooks;

pub use client::{Client, ClientBuilder};
pub use collections::Collections;
pub use config::{API_TOKEN_ENV, BASE_URL_ENV, DEFAULT_POLL_INTERVAL, POLL_INTERVAL_ENV};
pub use deployments::{DeploymentPredictions, Deployments};
pub use errors::{ApiError, ReplicateError};
pub use files::{DEFAULT_CONTENT_TYPE, File, FileUpload, Files, data_uri, guess_content_type};
pub use http::retry::RetryPolicy;
pub use http::transport::{ApiResponse, RequestOptions};
pub use models::{Models, Versions};
pub use pagination::{Cursor, Page};
pub use prediction::{Prediction, PredictionMetrics, PredictionStatus, PredictionUrls, Progress};
pub use predictions::{PredictionRequest, Predictions, WaitOptions, WebhookEvent};
pub use run::ModelReference;
pub use streaming::{EventKind, EventStream, ServerSentEvent};
pub use types::{Collection, Model, Version, VersionRef, Visibility, WebhookSigningSecret};
pub use webhooks::Webhooks;

/// Re-exported for [`WaitOptions::cancel`].
pub use tokio_util::sync::CancellationToken;
