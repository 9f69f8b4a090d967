//! Configuration resolution from explicit settings and the environment.
//!
//! Explicit builder values always win. The API token is resolved on every
//! request rather than at construction, so a token injected into the
//! environment after the client was built (dotenv loaders, test harnesses)
//! is still picked up.

use crate::errors::ReplicateError;
use crate::http::common::DEFAULT_BASE_URL;
use std::time::Duration;

pub const API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";
pub const BASE_URL_ENV: &str = "REPLICATE_API_BASE_URL";
pub const POLL_INTERVAL_ENV: &str = "REPLICATE_POLL_INTERVAL";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Reads a variable from the process environment.
pub(crate) fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolves the API token: the explicit value if configured, else the
/// environment. An explicit empty token is an error, not a fallback.
pub(crate) fn resolve_api_token(
    explicit: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ReplicateError> {
    let token = match explicit {
        Some(token) => Some(token.to_string()),
        None => env(API_TOKEN_ENV),
    };
    token
        .filter(|token| !token.trim().is_empty())
        .ok_or(ReplicateError::Auth)
}

pub(crate) fn resolve_base_url(
    explicit: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> String {
    explicit
        .map(String::from)
        .or_else(|| env(BASE_URL_ENV).filter(|url| !url.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Resolves the poll interval. The environment value is float seconds;
/// unparseable, negative or unrepresentably large values are ignored with
/// a warning.
pub(crate) fn resolve_poll_interval(
    explicit: Option<Duration>,
    env: impl Fn(&str) -> Option<String>,
) -> Duration {
    if let Some(interval) = explicit {
        return interval;
    }
    let Some(raw) = env(POLL_INTERVAL_ENV) else {
        return DEFAULT_POLL_INTERVAL;
    };
    match raw.trim().parse::<f64>().map(Duration::try_from_secs_f64) {
        Ok(Ok(interval)) => interval,
        _ => {
            tracing::warn!("Ignoring invalid {POLL_INTERVAL_ENV}={raw:?}");
            DEFAULT_POLL_INTERVAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    fn empty_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_explicit_token_wins() {
        let env = env_with(&[(API_TOKEN_ENV, "r8_env")]);
        assert_eq!(resolve_api_token(Some("r8_explicit"), env).unwrap(), "r8_explicit");
    }

    #[test]
    fn test_token_falls_back_to_env() {
        let env = env_with(&[(API_TOKEN_ENV, "r8_env")]);
        assert_eq!(resolve_api_token(None, env).unwrap(), "r8_env");
    }

    #[test]
    fn test_missing_token_is_auth_error() {
        assert!(matches!(resolve_api_token(None, empty_env), Err(ReplicateError::Auth)));
    }

    #[test]
    fn test_empty_explicit_token_does_not_fall_back() {
        let env = env_with(&[(API_TOKEN_ENV, "r8_env")]);
        assert!(matches!(resolve_api_token(Some(""), env), Err(ReplicateError::Auth)));
    }

    #[test]
    fn test_base_url_resolution() {
        assert_eq!(resolve_base_url(None, empty_env), DEFAULT_BASE_URL);
        let env = env_with(&[(BASE_URL_ENV, "http://localhost:5000")]);
        assert_eq!(resolve_base_url(None, &env), "http://localhost:5000");
        assert_eq!(resolve_base_url(Some("http://override"), &env), "http://override");
    }

    #[test]
    fn test_poll_interval_resolution() {
        assert_eq!(resolve_poll_interval(None, empty_env), DEFAULT_POLL_INTERVAL);

        let env = env_with(&[(POLL_INTERVAL_ENV, "1.5")]);
        assert_eq!(resolve_poll_interval(None, &env), Duration::from_millis(1500));
        assert_eq!(
            resolve_poll_interval(Some(Duration::from_secs(3)), &env),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_invalid_poll_interval_ignored() {
        let env = env_with(&[(POLL_INTERVAL_ENV, "soon")]);
        assert_eq!(resolve_poll_interval(None, env), DEFAULT_POLL_INTERVAL);
        let env = env_with(&[(POLL_INTERVAL_ENV, "-1")]);
        assert_eq!(resolve_poll_interval(None, env), DEFAULT_POLL_INTERVAL);
        let env = env_with(&[(POLL_INTERVAL_ENV, "1e300")]);
        assert_eq!(resolve_poll_interval(None, env), DEFAULT_POLL_INTERVAL);
        let env = env_with(&[(POLL_INTERVAL_ENV, "NaN")]);
        assert_eq!(resolve_poll_interval(None, env), DEFAULT_POLL_INTERVAL);
    }
}
