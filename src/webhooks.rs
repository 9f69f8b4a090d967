//! The Webhooks namespace and signature verification for webhook deliveries.
//!
//! Replicate signs each delivery with HMAC-SHA256 over
//! `"{webhook-id}.{webhook-timestamp}.{body}"`, keyed with the base64 payload
//! of the signing secret. The `webhook-signature` header carries one or more
//! space-separated `v1,<base64 signature>` entries.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::http::common::Endpoint;
use crate::types::WebhookSigningSecret;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha2::Sha256;

pub const WEBHOOK_ID_HEADER: &str = "webhook-id";
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "webhook-timestamp";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "webhook-signature";

type HmacSha256 = Hmac<Sha256>;

/// Operations on webhooks. Obtained from [`Client::webhooks`].
#[derive(Debug, Clone, Copy)]
pub struct Webhooks<'a> {
    client: &'a Client,
}

impl<'a> Webhooks<'a> {
    pub(crate) const fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Fetches the signing secret for the account's default webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn default_secret(&self) -> Result<WebhookSigningSecret, ReplicateError> {
        self.client
            .transport
            .get_json(
                &Endpoint::DefaultWebhookSecret.path(),
                "WebhookSigningSecret from get",
            )
            .await
    }

    /// Checks the signature of an incoming webhook delivery.
    ///
    /// Returns `Ok(true)` if any signature in the header matches.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] if a required header or the
    /// body is missing, or if the secret or a signature is malformed.
    pub fn validate(
        headers: &HeaderMap,
        body: &str,
        secret: &WebhookSigningSecret,
    ) -> Result<bool, ReplicateError> {
        let webhook_id = required_header(headers, WEBHOOK_ID_HEADER)?;
        let timestamp = required_header(headers, WEBHOOK_TIMESTAMP_HEADER)?;
        let signatures = required_header(headers, WEBHOOK_SIGNATURE_HEADER)?;
        if body.is_empty() {
            return Err(invalid("missing webhook body"));
        }

        let key = signing_key(secret)?;
        let signed_content = format!("{webhook_id}.{timestamp}.{body}");

        for entry in signatures.split_whitespace() {
            let (_, encoded) = entry
                .split_once(',')
                .ok_or_else(|| invalid(format!("invalid signature format: {entry}")))?;
            let signature = STANDARD
                .decode(encoded)
                .map_err(|e| invalid(format!("invalid signature encoding: {e}")))?;

            let mut mac = HmacSha256::new_from_slice(&key)
                .map_err(|e| invalid(format!("invalid signing key: {e}")))?;
            mac.update(signed_content.as_bytes());
            if mac.verify_slice(&signature).is_ok() {
                return Ok(true);
            }
        }

        tracing::debug!("No webhook signature matched for id {webhook_id}");
        Ok(false)
    }
}

fn invalid(message: impl Into<String>) -> ReplicateError {
    ReplicateError::Validation(message.into())
}

fn required_header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, ReplicateError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid(format!("missing {name} header")))
}

/// Decodes the key from a `whsec_<base64>` secret.
fn signing_key(secret: &WebhookSigningSecret) -> Result<Vec<u8>, ReplicateError> {
    let parts: Vec<&str> = secret.key.split('_').collect();
    let [_, encoded] = parts.as_slice() else {
        return Err(invalid("invalid secret key format"));
    };
    STANDARD
        .decode(encoded)
        .map_err(|e| invalid(format!("invalid secret key encoding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const BODY: &str = r#"{"test": 2432232314}"#;

    fn secret() -> WebhookSigningSecret {
        WebhookSigningSecret {
            key: SECRET.to_string(),
        }
    }

    fn sign(id: &str, timestamp: &str, body: &str) -> String {
        let key = signing_key(&secret()).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{id}.{timestamp}.{body}").as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn headers(signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_ID_HEADER, HeaderValue::from_static("msg_p5jXN8AQM9LWM0D4loKWxJek"));
        headers.insert(WEBHOOK_TIMESTAMP_HEADER, HeaderValue::from_static("1614265330"));
        headers.insert(
            WEBHOOK_SIGNATURE_HEADER,
            HeaderValue::from_str(signature).unwrap(),
        );
        headers
    }

    #[test]
    fn test_valid_signature() {
        let signature = format!("v1,{}", sign("msg_p5jXN8AQM9LWM0D4loKWxJek", "1614265330", BODY));
        assert!(Webhooks::validate(&headers(&signature), BODY, &secret()).unwrap());
    }

    #[test]
    fn test_any_of_multiple_signatures() {
        let good = sign("msg_p5jXN8AQM9LWM0D4loKWxJek", "1614265330", BODY);
        let signature = format!("v1,{} v1,{good}", STANDARD.encode(b"stale signature"));
        assert!(Webhooks::validate(&headers(&signature), BODY, &secret()).unwrap());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = format!("v1,{}", sign("msg_p5jXN8AQM9LWM0D4loKWxJek", "1614265330", BODY));
        assert!(!Webhooks::validate(&headers(&signature), r#"{"test": 1}"#, &secret()).unwrap());
    }

    #[test]
    fn test_missing_header() {
        let mut headers = headers("v1,abc=");
        headers.remove(WEBHOOK_TIMESTAMP_HEADER);
        let err = Webhooks::validate(&headers, BODY, &secret()).unwrap_err();
        assert!(err.to_string().contains("webhook-timestamp"));
    }

    #[test]
    fn test_missing_body() {
        let err = Webhooks::validate(&headers("v1,abc="), "", &secret()).unwrap_err();
        assert!(matches!(err, ReplicateError::Validation(_)));
    }

    #[test]
    fn test_malformed_secret() {
        let bad = WebhookSigningSecret {
            key: "not-a-secret".to_string(),
        };
        let err = Webhooks::validate(&headers("v1,abc="), BODY, &bad).unwrap_err();
        assert!(err.to_string().contains("secret key format"));
    }

    #[test]
    fn test_malformed_signature_entry() {
        let err = Webhooks::validate(&headers("nocomma"), BODY, &secret()).unwrap_err();
        assert!(err.to_string().contains("signature format"));
    }
}
