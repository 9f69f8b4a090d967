//! `Client::run` and `Client::stream`: create a prediction from a model
//! reference, then wait for its output or open its event stream.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::prediction::{Prediction, PredictionStatus};
use crate::predictions::{PredictionRequest, WaitOptions, model_error};
use crate::streaming::EventStream;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// What a `run` call targets.
///
/// Parsed from `owner/name`, `owner/name:version`, or a bare version id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelReference {
    /// The latest version of a model, through the model endpoint.
    Model { owner: String, name: String },
    /// A pinned version of a model.
    ModelVersion {
        owner: String,
        name: String,
        version: String,
    },
    /// A version id without its model.
    Version(String),
}

impl ModelReference {
    /// Returns the version id this reference pins, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Model { .. } => None,
            Self::ModelVersion { version, .. } | Self::Version(version) => Some(version),
        }
    }
}

impl FromStr for ModelReference {
    type Err = ReplicateError;

    fn from_str(reference: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ReplicateError::Validation(format!(
                "invalid reference {reference:?}; expected \"owner/name\", \
                 \"owner/name:version\", or a version id"
            ))
        };

        let (model, version) = match reference.split_once(':') {
            Some((model, version)) if !version.is_empty() => (model, Some(version)),
            Some(_) => return Err(invalid()),
            None => (reference, None),
        };

        if !model.contains('/') {
            return match version {
                None if !model.is_empty() => Ok(Self::Version(model.to_string())),
                _ => Err(invalid()),
            };
        }

        let (owner, name) = crate::http::common::split_owner_name(model).ok_or_else(invalid)?;
        let (owner, name) = (owner.to_string(), name.to_string());
        Ok(match version {
            Some(version) => Self::ModelVersion {
                owner,
                name,
                version: version.to_string(),
            },
            None => Self::Model { owner, name },
        })
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model { owner, name } => write!(f, "{owner}/{name}"),
            Self::ModelVersion {
                owner,
                name,
                version,
            } => write!(f, "{owner}/{name}:{version}"),
            Self::Version(version) => f.write_str(version),
        }
    }
}

impl Client {
    /// Runs a model and waits for its output.
    ///
    /// `reference` is `owner/name`, `owner/name:version`, or a version id.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The reference is malformed ([`ReplicateError::Validation`])
    /// - Creating or polling the prediction fails
    /// - The prediction finishes as `failed` ([`ReplicateError::Model`])
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), replicate_rs::ReplicateError> {
    /// let client = replicate_rs::Client::new()?;
    /// let output = client
    ///     .run(
    ///         "replicate/hello-world:5c7d5dc6dd8bf75c1acaa8565735e7986bc5b66206b55cca93cb72c9bf15ccaa",
    ///         serde_json::json!({"text": "Alice"}),
    ///     )
    ///     .await?;
    /// println!("{output}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(
        &self,
        reference: &str,
        input: impl Serialize,
    ) -> Result<serde_json::Value, ReplicateError> {
        let reference: ModelReference = reference.parse()?;
        debug!("Running {reference}");

        let mut prediction = self.create_for_reference(&reference, input, false).await?;

        self.predictions()
            .wait(&mut prediction, WaitOptions::default())
            .await?;

        if prediction.status == PredictionStatus::Failed {
            return Err(model_error(&prediction));
        }
        Ok(prediction.output.unwrap_or(serde_json::Value::Null))
    }

    /// Runs a model with streaming enabled and opens its event stream.
    ///
    /// `reference` takes the same forms as in [`Client::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The reference is malformed ([`ReplicateError::Validation`])
    /// - Creating the prediction fails
    /// - The model does not support streaming ([`ReplicateError::StreamUnavailable`])
    ///
    /// Failures after the connection opens are yielded by the stream.
    pub async fn stream(
        &self,
        reference: &str,
        input: impl Serialize,
    ) -> Result<EventStream<'static>, ReplicateError> {
        let reference: ModelReference = reference.parse()?;
        debug!("Streaming {reference}");

        let prediction = self.create_for_reference(&reference, input, true).await?;
        self.predictions().stream(&prediction)
    }

    /// `stream: false` leaves the flag out of the request body.
    async fn create_for_reference(
        &self,
        reference: &ModelReference,
        input: impl Serialize,
        stream: bool,
    ) -> Result<Prediction, ReplicateError> {
        let flagged = |request: PredictionRequest| {
            if stream { request.with_stream(true) } else { request }
        };
        match reference {
            ModelReference::Model { owner, name } => {
                self.models()
                    .create_prediction(
                        &format!("{owner}/{name}"),
                        flagged(PredictionRequest::from_input(input)),
                    )
                    .await
            }
            ModelReference::ModelVersion { version, .. } | ModelReference::Version(version) => {
                self.predictions()
                    .create(flagged(PredictionRequest::new(version.as_str(), input)))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_reference() {
        assert_eq!(
            "meta/llama-3".parse::<ModelReference>().unwrap(),
            ModelReference::Model {
                owner: "meta".into(),
                name: "llama-3".into()
            }
        );
    }

    #[test]
    fn test_parse_model_version_reference() {
        let reference: ModelReference = "replicate/hello-world:5c7d5dc6".parse().unwrap();
        assert_eq!(reference.version(), Some("5c7d5dc6"));
        assert_eq!(reference.to_string(), "replicate/hello-world:5c7d5dc6");
    }

    #[test]
    fn test_parse_bare_version() {
        let reference: ModelReference = "5c7d5dc6dd8bf75c".parse().unwrap();
        assert_eq!(reference, ModelReference::Version("5c7d5dc6dd8bf75c".into()));
    }

    #[test]
    fn test_parse_invalid_references() {
        for bad in ["", "owner/", "/name", "a/b/c", "owner/name:", ":abc", "a/b/c:v"] {
            assert!(
                matches!(bad.parse::<ModelReference>(), Err(ReplicateError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
