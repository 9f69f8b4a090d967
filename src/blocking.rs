//! A blocking client for the Replicate API.
//!
//! The blocking [`Client`] wraps the non-blocking [`crate::Client`] and a
//! private current-thread tokio runtime. Every call drives the async
//! implementation to completion with `block_on`, so both faces share the
//! same retry policy, error normalization and polling loop. Retry backoff
//! and poll intervals block the calling thread. No background threads are
//! spawned.
//!
//! # Panics
//!
//! Calling any method from within an async runtime panics, because a
//! runtime cannot be blocked on from inside another. Use the non-blocking
//! client there instead.
//!
//! # Example
//!
//! ```no_run
//! use replicate_rs::blocking::Client;
//! use replicate_rs::{PredictionRequest, WaitOptions};
//!
//! # fn main() -> Result<(), replicate_rs::ReplicateError> {
//! let client = Client::new()?;
//! let mut prediction = client.predictions().create(PredictionRequest::new(
//!     "5c7d5dc6dd8bf75c1acaa8565735e7986bc5b66206b55cca93cb72c9bf15ccaa",
//!     serde_json::json!({"text": "Alice"}),
//! ))?;
//! client.predictions().wait(&mut prediction, WaitOptions::default())?;
//! println!("{:?}", prediction.output);
//! # Ok(())
//! # }
//! ```

use crate::client::ClientBuilder;
use crate::errors::ReplicateError;
use crate::files::{File, FileUpload};
use crate::http::transport::{ApiResponse, RequestOptions};
use crate::pagination::{Cursor, Page};
use crate::prediction::Prediction;
use crate::predictions::{PredictionRequest, WaitOptions};
use crate::streaming::ServerSentEvent;
use crate::types::{Collection, Model, Version, WebhookSigningSecret};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Method;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// The blocking client. Cloning shares the runtime and connection pools.
#[derive(Debug, Clone)]
pub struct Client {
    inner: crate::Client,
    runtime: Arc<Runtime>,
}

impl Client {
    /// Creates a client configured entirely from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::ClientBuild`] if the runtime or HTTP pools
    /// cannot be built.
    pub fn new() -> Result<Self, ReplicateError> {
        Self::from_builder(crate::Client::builder())
    }

    /// Builds a blocking client from the same builder the async client uses.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::ClientBuild`] if the runtime or HTTP pools
    /// cannot be built.
    pub fn from_builder(builder: ClientBuilder) -> Result<Self, ReplicateError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ReplicateError::ClientBuild(e.to_string()))?;

        Ok(Self {
            inner: builder.build()?,
            runtime: Arc::new(runtime),
        })
    }

    /// The non-blocking client this one drives.
    #[must_use]
    pub const fn as_async(&self) -> &crate::Client {
        &self.inner
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.inner.poll_interval()
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    #[must_use]
    pub const fn predictions(&self) -> Predictions<'_> {
        Predictions { client: self }
    }

    #[must_use]
    pub const fn models(&self) -> Models<'_> {
        Models { client: self }
    }

    #[must_use]
    pub const fn collections(&self) -> Collections<'_> {
        Collections { client: self }
    }

    #[must_use]
    pub const fn deployments(&self) -> Deployments<'_> {
        Deployments { client: self }
    }

    #[must_use]
    pub const fn webhooks(&self) -> Webhooks<'_> {
        Webhooks { client: self }
    }

    #[must_use]
    pub const fn files(&self) -> Files<'_> {
        Files { client: self }
    }

    /// Blocking form of [`crate::Client::request`].
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any non-2xx response.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ReplicateError> {
        self.block_on(self.inner.request(method, path, options))
    }

    /// Blocking form of [`crate::Client::run`].
    ///
    /// # Errors
    ///
    /// See [`crate::Client::run`].
    pub fn run(
        &self,
        reference: &str,
        input: impl Serialize,
    ) -> Result<serde_json::Value, ReplicateError> {
        self.block_on(self.inner.run(reference, input))
    }

    /// Blocking form of [`crate::Client::stream`].
    ///
    /// # Errors
    ///
    /// See [`crate::Client::stream`].
    pub fn stream(
        &self,
        reference: &str,
        input: impl Serialize,
    ) -> Result<BlockingIter<'_, ServerSentEvent>, ReplicateError> {
        Ok(BlockingIter {
            runtime: &self.runtime,
            stream: self.block_on(self.inner.stream(reference, input))?,
        })
    }
}

/// Iterates a stream by blocking on each item.
pub struct BlockingIter<'a, T> {
    runtime: &'a Runtime,
    stream: BoxStream<'a, Result<T, ReplicateError>>,
}

impl<T> std::fmt::Debug for BlockingIter<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingIter").finish_non_exhaustive()
    }
}

impl<T> Iterator for BlockingIter<'_, T> {
    type Item = Result<T, ReplicateError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

/// Blocking form of [`crate::Predictions`].
#[derive(Debug, Clone, Copy)]
pub struct Predictions<'a> {
    client: &'a Client,
}

impl<'a> Predictions<'a> {
    fn inner(&self) -> crate::Predictions<'a> {
        self.client.inner.predictions()
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::create`].
    pub fn create(&self, request: PredictionRequest) -> Result<Prediction, ReplicateError> {
        self.client.block_on(self.inner().create(request))
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::get`].
    pub fn get(&self, id: &str) -> Result<Prediction, ReplicateError> {
        self.client.block_on(self.inner().get(id))
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::reload`].
    pub fn reload(&self, prediction: &mut Prediction) -> Result<(), ReplicateError> {
        self.client.block_on(self.inner().reload(prediction))
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::cancel`].
    pub fn cancel(&self, id: &str) -> Result<Prediction, ReplicateError> {
        self.client.block_on(self.inner().cancel(id))
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::cancel_prediction`].
    pub fn cancel_prediction(&self, prediction: &mut Prediction) -> Result<(), ReplicateError> {
        self.client
            .block_on(self.inner().cancel_prediction(prediction))
    }

    /// Blocks the calling thread until `prediction` is terminal, the
    /// timeout elapses, or the cancellation token fires.
    ///
    /// # Errors
    ///
    /// See [`crate::Predictions::wait`].
    pub fn wait(
        &self,
        prediction: &mut Prediction,
        options: WaitOptions,
    ) -> Result<(), ReplicateError> {
        self.client.block_on(self.inner().wait(prediction, options))
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::list`].
    pub fn list(&self) -> Result<Page<Prediction>, ReplicateError> {
        self.client.block_on(self.inner().list())
    }

    /// # Errors
    ///
    /// See [`crate::Predictions::list_from`].
    pub fn list_from(&self, cursor: impl Into<Cursor>) -> Result<Page<Prediction>, ReplicateError> {
        self.client.block_on(self.inner().list_from(cursor))
    }

    /// Blocking form of [`crate::Predictions::output_stream`].
    #[must_use]
    pub fn output_iter(&self, prediction: Prediction) -> BlockingIter<'a, serde_json::Value> {
        BlockingIter {
            runtime: &self.client.runtime,
            stream: self.inner().output_stream(prediction),
        }
    }

    /// Blocking form of [`crate::Predictions::stream`].
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::StreamUnavailable`] if the prediction has no
    /// `stream` URL.
    pub fn stream(
        &self,
        prediction: &Prediction,
    ) -> Result<BlockingIter<'a, ServerSentEvent>, ReplicateError> {
        Ok(BlockingIter {
            runtime: &self.client.runtime,
            stream: self.inner().stream(prediction)?,
        })
    }
}

/// Blocking form of [`crate::Models`].
#[derive(Debug, Clone, Copy)]
pub struct Models<'a> {
    client: &'a Client,
}

impl<'a> Models<'a> {
    fn inner(&self) -> crate::Models<'a> {
        self.client.inner.models()
    }

    /// # Errors
    ///
    /// See [`crate::Models::get`].
    pub fn get(&self, reference: &str) -> Result<Model, ReplicateError> {
        self.client.block_on(self.inner().get(reference))
    }

    /// # Errors
    ///
    /// See [`crate::Models::list`].
    pub fn list(&self) -> Result<Page<Model>, ReplicateError> {
        self.client.block_on(self.inner().list())
    }

    /// # Errors
    ///
    /// See [`crate::Models::list_from`].
    pub fn list_from(&self, cursor: impl Into<Cursor>) -> Result<Page<Model>, ReplicateError> {
        self.client.block_on(self.inner().list_from(cursor))
    }

    /// # Errors
    ///
    /// See [`crate::Models::create_prediction`].
    pub fn create_prediction(
        &self,
        reference: &str,
        request: PredictionRequest,
    ) -> Result<Prediction, ReplicateError> {
        self.client
            .block_on(self.inner().create_prediction(reference, request))
    }

    #[must_use]
    pub fn versions(&self, reference: impl Into<String>) -> Versions<'a> {
        Versions {
            client: self.client,
            inner: self.inner().versions(reference),
        }
    }
}

/// Blocking form of [`crate::Versions`].
#[derive(Debug, Clone)]
pub struct Versions<'a> {
    client: &'a Client,
    inner: crate::Versions<'a>,
}

impl Versions<'_> {
    /// # Errors
    ///
    /// See [`crate::Versions::get`].
    pub fn get(&self, id: &str) -> Result<Version, ReplicateError> {
        self.client.block_on(self.inner.get(id))
    }

    /// # Errors
    ///
    /// See [`crate::Versions::list`].
    pub fn list(&self) -> Result<Page<Version>, ReplicateError> {
        self.client.block_on(self.inner.list())
    }

    /// # Errors
    ///
    /// See [`crate::Versions::list_from`].
    pub fn list_from(&self, cursor: impl Into<Cursor>) -> Result<Page<Version>, ReplicateError> {
        self.client.block_on(self.inner.list_from(cursor))
    }
}

/// Blocking form of [`crate::Collections`].
#[derive(Debug, Clone, Copy)]
pub struct Collections<'a> {
    client: &'a Client,
}

impl<'a> Collections<'a> {
    fn inner(&self) -> crate::Collections<'a> {
        self.client.inner.collections()
    }

    /// # Errors
    ///
    /// See [`crate::Collections::list`].
    pub fn list(&self) -> Result<Page<Collection>, ReplicateError> {
        self.client.block_on(self.inner().list())
    }

    /// # Errors
    ///
    /// See [`crate::Collections::list_from`].
    pub fn list_from(
        &self,
        cursor: impl Into<Cursor>,
    ) -> Result<Page<Collection>, ReplicateError> {
        self.client.block_on(self.inner().list_from(cursor))
    }

    /// # Errors
    ///
    /// See [`crate::Collections::get`].
    pub fn get(&self, slug: &str) -> Result<Collection, ReplicateError> {
        self.client.block_on(self.inner().get(slug))
    }
}

/// Blocking form of [`crate::Deployments`].
#[derive(Debug, Clone, Copy)]
pub struct Deployments<'a> {
    client: &'a Client,
}

impl<'a> Deployments<'a> {
    #[must_use]
    pub fn predictions(&self, reference: impl Into<String>) -> DeploymentPredictions<'a> {
        DeploymentPredictions {
            client: self.client,
            inner: self.client.inner.deployments().predictions(reference),
        }
    }
}

/// Blocking form of [`crate::DeploymentPredictions`].
#[derive(Debug, Clone)]
pub struct DeploymentPredictions<'a> {
    client: &'a Client,
    inner: crate::DeploymentPredictions<'a>,
}

impl DeploymentPredictions<'_> {
    /// # Errors
    ///
    /// See [`crate::DeploymentPredictions::create`].
    pub fn create(&self, request: PredictionRequest) -> Result<Prediction, ReplicateError> {
        self.client.block_on(self.inner.create(request))
    }
}

/// Blocking form of [`crate::Webhooks`].
#[derive(Debug, Clone, Copy)]
pub struct Webhooks<'a> {
    client: &'a Client,
}

impl Webhooks<'_> {
    /// # Errors
    ///
    /// See [`crate::Webhooks::default_secret`].
    pub fn default_secret(&self) -> Result<WebhookSigningSecret, ReplicateError> {
        self.client
            .block_on(self.client.inner.webhooks().default_secret())
    }
}

/// Blocking form of [`crate::Files`].
#[derive(Debug, Clone, Copy)]
pub struct Files<'a> {
    client: &'a Client,
}

impl<'a> Files<'a> {
    fn inner(&self) -> crate::Files<'a> {
        self.client.inner.files()
    }

    /// # Errors
    ///
    /// See [`crate::Files::create`].
    pub fn create(&self, upload: FileUpload) -> Result<File, ReplicateError> {
        self.client.block_on(self.inner().create(upload))
    }

    /// # Errors
    ///
    /// See [`crate::Files::get`].
    pub fn get(&self, id: &str) -> Result<File, ReplicateError> {
        self.client.block_on(self.inner().get(id))
    }

    /// # Errors
    ///
    /// See [`crate::Files::list`].
    pub fn list(&self) -> Result<Page<File>, ReplicateError> {
        self.client.block_on(self.inner().list())
    }

    /// # Errors
    ///
    /// See [`crate::Files::list_from`].
    pub fn list_from(&self, cursor: impl Into<Cursor>) -> Result<Page<File>, ReplicateError> {
        self.client.block_on(self.inner().list_from(cursor))
    }

    /// # Errors
    ///
    /// See [`crate::Files::delete`].
    pub fn delete(&self, id: &str) -> Result<(), ReplicateError> {
        self.client.block_on(self.inner().delete(id))
    }
}
