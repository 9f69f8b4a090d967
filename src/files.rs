//! The Files namespace, and inline `data:` URIs for small file inputs.
//!
//! Uploaded files get a URL that prediction inputs can reference. Small files
//! can skip the upload and travel inside the input as a base64 `data:` URI.

use crate::client::Client;
use crate::errors::ReplicateError;
use crate::http::common::Endpoint;
use crate::http::transport::{MultipartFile, RequestOptions};
use crate::pagination::{Cursor, Page};
use crate::predictions::validate_id;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Sent when the content type is neither given nor recognized from the name.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file uploaded to Replicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub etag: String,
    /// Digests keyed by algorithm, e.g. `sha256`
    #[serde(default)]
    pub checksums: HashMap<String, String>,
    /// Caller-supplied metadata from the upload
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub urls: HashMap<String, String>,
}

impl File {
    /// The URL to pass as a prediction input.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.urls.get("get").map(String::as_str)
    }
}

/// The contents and name of a file to upload.
///
/// # Example
///
/// ```
/// use replicate_rs::FileUpload;
///
/// let upload = FileUpload::new("mask.png", vec![0x89, b'P', b'N', b'G'])
///     .with_metadata(serde_json::json!({"source": "editor"}));
/// assert_eq!(upload.content_type(), "image/png");
/// assert_eq!(upload.to_data_uri(), "data:image/png;base64,iVBORw==");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FileUpload {
    name: String,
    bytes: Bytes,
    content_type: Option<String>,
    metadata: Option<serde_json::Value>,
}

impl FileUpload {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
            metadata: None,
        }
    }

    /// Reads a file from disk, naming the upload after the file.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplicateError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            let suggestion = match e.kind() {
                std::io::ErrorKind::NotFound => " Check that the file path is correct.",
                std::io::ErrorKind::PermissionDenied => " Check file permissions.",
                _ => "",
            };
            ReplicateError::Validation(format!(
                "Failed to read file '{}': {e}.{suggestion}",
                path.display()
            ))
        })?;
        let name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |name| name.to_string_lossy().into_owned());
        Ok(Self::new(name, bytes))
    }

    /// Overrides the content type guessed from the name.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// JSON metadata stored with the file.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The explicit content type, else one guessed from the name, else
    /// [`DEFAULT_CONTENT_TYPE`].
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .or_else(|| guess_content_type(&self.name))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Encodes the contents as a `data:` URI for use directly as an input.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        data_uri(&self.bytes, self.content_type())
    }

    fn into_multipart(self) -> Result<MultipartFile, ReplicateError> {
        let content_type = self.content_type().to_string();
        let mut text_fields = Vec::new();
        if let Some(metadata) = &self.metadata {
            text_fields.push(("metadata", serde_json::to_string(metadata)?));
        }
        Ok(MultipartFile {
            field: "content",
            file_name: self.name,
            content_type,
            bytes: self.bytes,
            text_fields,
        })
    }
}

/// Builds a base64 `data:` URI.
#[must_use]
pub fn data_uri(bytes: &[u8], content_type: &str) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

/// Guesses a content type from a file name's extension.
///
/// Returns `None` for unrecognized or missing extensions.
#[must_use]
pub fn guess_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        // Images
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        // Audio
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "ogg" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "m4a" => Some("audio/mp4"),
        // Video
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        // Documents and archives
        "pdf" => Some("application/pdf"),
        "json" => Some("application/json"),
        "txt" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "zip" => Some("application/zip"),
        "tar" => Some("application/x-tar"),
        _ => None,
    }
}

/// Operations on uploaded files. Obtained from [`Client::files`].
#[derive(Debug, Clone, Copy)]
pub struct Files<'a> {
    client: &'a Client,
}

impl<'a> Files<'a> {
    pub(crate) const fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Uploads a file as `multipart/form-data`.
    ///
    /// Like every mutating request, the upload is only retried on 429.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for an empty file or an
    /// unparseable content type, or an error if the request fails.
    pub async fn create(&self, upload: FileUpload) -> Result<File, ReplicateError> {
        if upload.is_empty() {
            return Err(ReplicateError::Validation(
                "Cannot upload empty file".to_string(),
            ));
        }
        debug!(
            "Uploading file: name={}, size={} bytes, content_type={}",
            upload.name(),
            upload.len(),
            upload.content_type()
        );

        let options = RequestOptions {
            multipart: Some(upload.into_multipart()?),
            ..RequestOptions::default()
        };
        let file: File = self
            .client
            .transport
            .json(
                Method::POST,
                &Endpoint::CreateFile.path(),
                &options,
                "File from create",
            )
            .await?;

        debug!("File uploaded: {}", file.id);
        Ok(file)
    }

    /// Fetches a file's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for a blank id and
    /// [`ReplicateError::NotFound`] if the file does not exist.
    pub async fn get(&self, id: &str) -> Result<File, ReplicateError> {
        validate_id("file", id)?;
        debug!("Getting file: {id}");
        self.client
            .transport
            .get_json(&Endpoint::GetFile { id }.path(), "File from get")
            .await
    }

    /// Lists the first page of uploaded files, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Page<File>, ReplicateError> {
        self.list_from(Cursor::Start).await
    }

    /// Lists files starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for [`Cursor::Exhausted`].
    pub async fn list_from(&self, cursor: impl Into<Cursor>) -> Result<Page<File>, ReplicateError> {
        let target = cursor.into().target(Endpoint::ListFiles.path())?;
        self.client
            .transport
            .get_json(&target, "Page<File> from list")
            .await
    }

    /// Deletes a file.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicateError::Validation`] for a blank id and
    /// [`ReplicateError::NotFound`] if the file does not exist.
    pub async fn delete(&self, id: &str) -> Result<(), ReplicateError> {
        validate_id("file", id)?;
        debug!("Deleting file: {id}");
        self.client
            .transport
            .buffered(
                Method::DELETE,
                &Endpoint::DeleteFile { id }.path(),
                &RequestOptions::default(),
            )
            .await?;
        debug!("File deleted: {id}");
        Ok(())
    }
}
