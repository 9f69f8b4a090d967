use crate::collections::Collections;
use crate::config;
use crate::deployments::Deployments;
use crate::errors::ReplicateError;
use crate::files::Files;
use crate::http::retry::Backoff;
use crate::http::transport::{ApiResponse, RequestOptions, Transport, TransportSettings};
use crate::models::Models;
use crate::predictions::Predictions;
use crate::webhooks::Webhooks;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;

/// The non-blocking client for the Replicate API.
///
/// Cloning is cheap: clones share the connection pools.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) transport: Arc<Transport>,
    pub(crate) poll_interval: Duration,
}

/// Builder for `Client` instances.
///
/// Every setting left unset falls back to its environment variable, then to
/// the built-in default.
///
/// # Example
///
/// ```
/// use replicate_rs::Client;
/// use std::time::Duration;
///
/// let client = Client::builder()
///     .api_token("r8_example")
///     .timeout(Duration::from_secs(120))
///     .connect_timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    api_token: Option<String>,
    base_url: Option<String>,
    poll_interval: Option<Duration>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_timeout: Option<Option<Duration>>,
    max_retries: Option<u32>,
    retry_backoff: Option<Duration>,
}

impl ClientBuilder {
    /// Sets the API token, overriding `REPLICATE_API_TOKEN`.
    ///
    /// An empty token is not a fallback: requests fail with
    /// [`ReplicateError::Auth`].
    #[must_use]
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the API base URL, overriding `REPLICATE_API_BASE_URL`.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default interval between polls in `wait` and output streams,
    /// overriding `REPLICATE_POLL_INTERVAL`.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the total timeout of a single HTTP attempt.
    ///
    /// If not set, uses reqwest's default (no timeout).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// If not set, uses reqwest's default.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets how long an idle pooled connection is kept; `None` keeps idle
    /// connections without an expiry timer.
    ///
    /// If not set, uses reqwest's default (90 seconds).
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.pool_idle_timeout = Some(timeout.into());
        self
    }

    /// Sets how many times a retryable failure is retried (default 5).
    /// Zero disables retries.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the base delay of the exponential backoff (default 2s).
    #[must_use]
    pub const fn retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = Some(base);
        self
    }

    /// Builds the `Client`.
    ///
    /// The API token is not checked here; it is resolved on every request.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::ClientBuild`] if the HTTP pools cannot be built.
    pub fn build(self) -> Result<Client, ReplicateError> {
        let defaults = Backoff::default();
        let settings = TransportSettings {
            base_url: config::resolve_base_url(self.base_url.as_deref(), config::process_env),
            api_token: self.api_token,
            backoff: Backoff {
                max_retries: self.max_retries.unwrap_or(defaults.max_retries),
                base: self.retry_backoff.unwrap_or(defaults.base),
            },
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            pool_idle_timeout: self.pool_idle_timeout,
        };

        Ok(Client {
            transport: Arc::new(Transport::new(settings)?),
            poll_interval: config::resolve_poll_interval(self.poll_interval, config::process_env),
        })
    }
}

impl Client {
    /// Creates a new builder for `Client` instances.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a client configured entirely from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::ClientBuild`] if the HTTP pools cannot be built.
    pub fn new() -> Result<Self, ReplicateError> {
        Self::builder().build()
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// The default interval between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub const fn predictions(&self) -> Predictions<'_> {
        Predictions::new(self)
    }

    #[must_use]
    pub const fn models(&self) -> Models<'_> {
        Models::new(self)
    }

    #[must_use]
    pub const fn collections(&self) -> Collections<'_> {
        Collections::new(self)
    }

    #[must_use]
    pub const fn deployments(&self) -> Deployments<'_> {
        Deployments::new(self)
    }

    #[must_use]
    pub const fn webhooks(&self) -> Webhooks<'_> {
        Webhooks::new(self)
    }

    #[must_use]
    pub const fn files(&self) -> Files<'_> {
        Files::new(self)
    }

    /// Sends a raw request under the same auth, retry and error rules as the
    /// typed namespaces.
    ///
    /// `path` is relative to the base URL (e.g. `/v1/account`) or absolute.
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any non-2xx response.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use replicate_rs::{Client, RequestOptions};
    /// use reqwest::Method;
    ///
    /// # async fn example() -> Result<(), replicate_rs::ReplicateError> {
    /// let client = Client::new()?;
    /// let response = client
    ///     .request(Method::GET, "/v1/account", RequestOptions::new())
    ///     .await?;
    /// let account: serde_json::Value = response.json()?;
    /// println!("{}", account["username"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ReplicateError> {
        self.transport.buffered(method, path, &options).await
    }
}
