//! The Collections namespace.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::http::common::Endpoint;
use crate::pagination::{Cursor, Page};
use crate::types::Collection;
use tracing::debug;

/// Operations on model collections. Obtained from [`Client::collections`].
#[derive(Debug, Clone, Copy)]
pub struct Collections<'a> {
    client: &'a Client,
}

impl<'a> Collections<'a> {
    pub(crate) const fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Lists the first page of collections. Listed collections do not
    /// include their models; use [`get`](Self::get) for that.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Page<Collection>, ReplicateError> {
        self.list_from(Cursor::Start).await
    }

    /// Lists collections starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for [`Cursor::Exhausted`].
    pub async fn list_from(
        &self,
        cursor: impl Into<Cursor>,
    ) -> Result<Page<Collection>, ReplicateError> {
        let target = cursor.into().target(Endpoint::ListCollections.path())?;
        self.client
            .transport
            .get_json(&target, "Page<Collection> from list")
            .await
    }

    /// Fetches a collection and its models by slug.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::NotFound`] if no collection has this slug.
    pub async fn get(&self, slug: &str) -> Result<Collection, ReplicateError> {
        debug!("Getting collection: {slug}");
        self.client
            .transport
            .get_json(
                &Endpoint::GetCollection { slug }.path(),
                "Collection from get",
            )
            .await
    }
}
