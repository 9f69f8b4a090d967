//! Cursor-based pagination for list endpoints.

use crate::errors::ReplicateError;
use serde::{Deserialize, Serialize};

/// Where a list call starts.
///
/// `Start` fetches the first page. `Url` follows a `next`/`previous` value
/// from an earlier [`Page`]. `Exhausted` is what a missing cursor converts
/// to; listing from it is a validation error rather than a silent restart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Start,
    Url(String),
    Exhausted,
}

impl Cursor {
    /// Returns the request target for this cursor, or `default` for `Start`.
    pub(crate) fn target(&self, default: String) -> Result<String, ReplicateError> {
        match self {
            Self::Start => Ok(default),
            Self::Url(url) => Ok(url.clone()),
            Self::Exhausted => Err(ReplicateError::Validation(
                "cursor cannot be None".to_string(),
            )),
        }
    }
}

impl From<String> for Cursor {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<&str> for Cursor {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<Option<String>> for Cursor {
    fn from(url: Option<String>) -> Self {
        url.map_or(Self::Exhausted, Self::Url)
    }
}

impl From<Option<&str>> for Cursor {
    fn from(url: Option<&str>) -> Self {
        url.map_or(Self::Exhausted, Self::from)
    }
}

/// One page of a list endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    /// Cursor for the following page, if any
    #[serde(default)]
    pub next: Option<String>,
    /// Cursor for the preceding page, if any
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> Page<T> {
    /// Returns the cursor for the next page, or `None` on the last page.
    #[must_use]
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.next.clone().map(Cursor::Url)
    }

    #[must_use]
    pub fn previous_cursor(&self) -> Option<Cursor> {
        self.previous.clone().map(Cursor::Url)
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_targets() {
        assert_eq!(
            Cursor::Start.target("/v1/predictions".into()).unwrap(),
            "/v1/predictions"
        );
        assert_eq!(
            Cursor::from("https://api.replicate.com/v1/predictions?cursor=cD0y")
                .target("/v1/predictions".into())
                .unwrap(),
            "https://api.replicate.com/v1/predictions?cursor=cD0y"
        );
    }

    #[test]
    fn test_missing_cursor_is_validation_error() {
        let cursor = Cursor::from(None::<String>);
        assert_eq!(cursor, Cursor::Exhausted);
        let err = cursor.target("/v1/predictions".into()).unwrap_err();
        assert!(matches!(err, ReplicateError::Validation(ref msg) if msg.contains("cursor")));
    }

    #[test]
    fn test_page_cursors() {
        let page: Page<serde_json::Value> = serde_json::from_str(
            r#"{"results": [1, 2], "next": "https://api.replicate.com/v1/models?cursor=abc", "previous": null}"#,
        )
        .unwrap();

        assert_eq!(
            page.next_cursor(),
            Some(Cursor::Url("https://api.replicate.com/v1/models?cursor=abc".into()))
        );
        assert_eq!(page.previous_cursor(), None);
        assert_eq!(page.into_iter().count(), 2);
    }
}
