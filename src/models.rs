//! The Models and Versions namespaces.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::http::common::{Endpoint, split_owner_name};
use crate::pagination::{Cursor, Page};
use crate::prediction::Prediction;
use crate::predictions::{PredictionRequest, Predictions, validate_id};
use crate::types::{Model, Version};
use tracing::debug;

/// Parses an `owner/name` model reference.
pub(crate) fn parse_model_reference(reference: &str) -> Result<(&str, &str), ReplicateError> {
    split_owner_name(reference).ok_or_else(|| {
        ReplicateError::Validation(format!(
            "invalid model reference {reference:?}; expected \"owner/name\""
        ))
    })
}

/// Operations on models. Obtained from [`Client::models`].
#[derive(Debug, Clone, Copy)]
pub struct Models<'a> {
    client: &'a Client,
}

impl<'a> Models<'a> {
    pub(crate) const fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Fetches a model by its `owner/name` reference.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for a malformed reference and
    /// [`ReplicateError::NotFound`] if the model does not exist.
    pub async fn get(&self, reference: &str) -> Result<Model, ReplicateError> {
        let (owner, name) = parse_model_reference(reference)?;
        debug!("Getting model: {owner}/{name}");
        self.client
            .transport
            .get_json(&Endpoint::GetModel { owner, name }.path(), "Model from get")
            .await
    }

    /// Lists the first page of public models.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Page<Model>, ReplicateError> {
        self.list_from(Cursor::Start).await
    }

    /// Lists models starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for [`Cursor::Exhausted`].
    pub async fn list_from(&self, cursor: impl Into<Cursor>) -> Result<Page<Model>, ReplicateError> {
        let target = cursor.into().target(Endpoint::ListModels.path())?;
        self.client
            .transport
            .get_json(&target, "Page<Model> from list")
            .await
    }

    /// Creates a prediction against the latest version of an official model.
    ///
    /// Any version set on `request` is ignored; the model endpoint picks it.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for a malformed reference.
    pub async fn create_prediction(
        &self,
        reference: &str,
        request: PredictionRequest,
    ) -> Result<Prediction, ReplicateError> {
        let (owner, name) = parse_model_reference(reference)?;
        let body = request.into_body(false)?;
        debug!("Creating prediction for model {owner}/{name}");
        Predictions::new(self.client)
            .create_at(&Endpoint::CreateModelPrediction { owner, name }.path(), body)
            .await
    }

    /// Returns the versions of a model.
    #[must_use]
    pub fn versions(&self, reference: impl Into<String>) -> Versions<'a> {
        Versions {
            client: self.client,
            model: reference.into(),
        }
    }
}

/// Operations on the versions of one model. Obtained from [`Models::versions`].
#[derive(Debug, Clone)]
pub struct Versions<'a> {
    client: &'a Client,
    model: String,
}

impl Versions<'_> {
    /// The `owner/name` reference of the model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fetches one version of the model.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for a blank id and
    /// [`ReplicateError::NotFound`] if the version does not exist.
    pub async fn get(&self, id: &str) -> Result<Version, ReplicateError> {
        let (owner, name) = parse_model_reference(&self.model)?;
        validate_id("version", id)?;
        debug!("Getting version {id} of {owner}/{name}");
        self.client
            .transport
            .get_json(
                &Endpoint::GetVersion { owner, name, id }.path(),
                "Version from get",
            )
            .await
    }

    /// Lists the first page of versions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Page<Version>, ReplicateError> {
        self.list_from(Cursor::Start).await
    }

    /// Lists versions starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for [`Cursor::Exhausted`] or a
    /// malformed model reference.
    pub async fn list_from(
        &self,
        cursor: impl Into<Cursor>,
    ) -> Result<Page<Version>, ReplicateError> {
        let (owner, name) = parse_model_reference(&self.model)?;
        let target = cursor
            .into()
            .target(Endpoint::ListVersions { owner, name }.path())?;
        self.client
            .transport
            .get_json(&target, "Page<Version> from list")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_reference() {
        assert_eq!(
            parse_model_reference("stability-ai/sdxl").unwrap(),
            ("stability-ai", "sdxl")
        );
        for bad in ["", "sdxl", "/sdxl", "owner/", "a/b/c"] {
            assert!(
                matches!(parse_model_reference(bad), Err(ReplicateError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
