//! Read-only metadata entities: models, versions, collections, and the
//! webhook signing secret.

use crate::errors::ReplicateError;
use crate::prediction::Prediction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable build of a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cog_version: Option<String>,
    /// OpenAPI document describing the model's input and output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi_schema: Option<serde_json::Value>,
}

/// Visibility of a model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Visibility {
    Public,
    Private,
    /// A visibility value this library does not recognize.
    #[serde(other)]
    Unknown,
}

/// A model hosted on Replicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Name of the user or organization that owns the model
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    /// An example prediction shown on the model page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_example: Option<Box<Prediction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<Version>,
}

impl Model {
    /// Returns the `owner/name` reference for this model.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A curated collection of models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Models in the collection; only populated by `get`, not by `list`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<Model>>,
}

impl Collection {
    /// Number of models, zero when the list was not loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Model> {
        self.models.as_ref()?.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Model> {
        self.models.as_deref().unwrap_or_default().iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Model;
    type IntoIter = std::slice::Iter<'a, Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The secret used to sign webhook deliveries, of the form `whsec_<base64>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSigningSecret {
    pub key: String,
}

impl std::fmt::Debug for WebhookSigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigningSecret")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// The model version a prediction runs against: either a bare id or a
/// previously fetched [`Version`].
#[derive(Clone, Debug, PartialEq)]
pub enum VersionRef {
    Id(String),
    Resolved(Version),
}

impl VersionRef {
    /// Returns the version id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Resolved(version) => &version.id,
        }
    }

    /// Returns the id, failing if it is empty.
    pub(crate) fn validated_id(&self) -> Result<&str, ReplicateError> {
        let id = self.id();
        if id.trim().is_empty() {
            Err(ReplicateError::Validation(
                "version must not be empty".to_string(),
            ))
        } else {
            Ok(id)
        }
    }
}

impl From<&str> for VersionRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for VersionRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Version> for VersionRef {
    fn from(version: Version) -> Self {
        Self::Resolved(version)
    }
}

impl From<&Version> for VersionRef {
    fn from(version: &Version) -> Self {
        Self::Resolved(version.clone())
    }
}
