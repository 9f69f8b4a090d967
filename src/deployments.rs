//! The Deployments namespace.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::http::common::Endpoint;
use crate::models::parse_model_reference;
use crate::prediction::Prediction;
use crate::predictions::{PredictionRequest, Predictions};
use tracing::debug;

/// Operations on deployments. Obtained from [`Client::deployments`].
#[derive(Debug, Clone, Copy)]
pub struct Deployments<'a> {
    client: &'a Client,
}

impl<'a> Deployments<'a> {
    pub(crate) const fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Returns the predictions of a deployment named `owner/name`.
    #[must_use]
    pub fn predictions(&self, reference: impl Into<String>) -> DeploymentPredictions<'a> {
        DeploymentPredictions {
            client: self.client,
            deployment: reference.into(),
        }
    }
}

/// Predictions routed through one deployment.
#[derive(Debug, Clone)]
pub struct DeploymentPredictions<'a> {
    client: &'a Client,
    deployment: String,
}

impl DeploymentPredictions<'_> {
    #[must_use]
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Creates a prediction on the deployment. The deployment pins the
    /// version, so any version on `request` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for a malformed deployment name.
    pub async fn create(&self, request: PredictionRequest) -> Result<Prediction, ReplicateError> {
        let (owner, name) = parse_model_reference(&self.deployment)?;
        let body = request.into_body(false)?;
        debug!("Creating prediction on deployment {owner}/{name}");
        Predictions::new(self.client)
            .create_at(
                &Endpoint::CreateDeploymentPrediction { owner, name }.path(),
                body,
            )
            .await
    }
}
