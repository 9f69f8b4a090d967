//! Retry policies selected by HTTP method safety.
//!
//! Reads can be repeated freely, so they retry on rate limits and on the
//! server-error family (including Cloudflare's 52x codes). Mutations retry
//! only on 429, which guarantees the request was not processed; a 5xx on a
//! POST may have partially succeeded and is surfaced to the caller instead.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use std::time::Duration;

/// Statuses retried for idempotent requests.
pub const IDEMPOTENT_RETRY_STATUSES: &[u16] =
    &[429, 500, 502, 503, 504, 520, 521, 522, 523, 524, 526, 527];

/// Statuses retried for mutating requests.
pub const MUTATING_RETRY_STATUSES: &[u16] = &[429];

pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Upper bound for any single backoff delay, including `Retry-After`.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// The retry rule set applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// GET, HEAD, OPTIONS (and any other safe method).
    IdempotentRead,
    /// POST, PUT, PATCH, DELETE.
    Mutating,
}

impl RetryPolicy {
    /// Selects the policy for an HTTP method.
    #[must_use]
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::POST
            || *method == Method::PUT
            || *method == Method::PATCH
            || *method == Method::DELETE
        {
            Self::Mutating
        } else {
            Self::IdempotentRead
        }
    }

    /// Returns `true` if a response with this status should be retried.
    #[must_use]
    pub fn retries_status(self, status: StatusCode) -> bool {
        let statuses = match self {
            Self::IdempotentRead => IDEMPOTENT_RETRY_STATUSES,
            Self::Mutating => MUTATING_RETRY_STATUSES,
        };
        statuses.contains(&status.as_u16())
    }

    /// Returns `true` if a failed send should be retried.
    ///
    /// Connection failures never reached the server and are safe for every
    /// method. A timeout may have reached it, so only reads retry those.
    #[must_use]
    pub fn retries_error(self, error: &reqwest::Error) -> bool {
        if error.is_connect() {
            return true;
        }
        self == Self::IdempotentRead && error.is_timeout()
    }
}

/// Exponential backoff: `base * 2^(retry - 1)`, capped at [`MAX_BACKOFF`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl Backoff {
    /// Delay before the given retry (1-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Delay before the given retry, honoring a server `Retry-After` header.
    #[must_use]
    pub fn delay_for_response(&self, retry: u32, headers: &HeaderMap) -> Duration {
        parse_retry_after(headers)
            .map_or_else(|| self.delay(retry), |after| after.min(MAX_BACKOFF))
    }
}

/// Parses an integer-seconds `Retry-After` header.
///
/// HTTP-date values are ignored and fall back to the computed backoff.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
