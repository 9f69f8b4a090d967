//! URL construction and request headers shared by every namespace.

/// Represents the API version to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
}

impl ApiVersion {
    const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }
}

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("replicate-rs@", env!("CARGO_PKG_VERSION"));

/// Builds the `Authorization` header value for an API token.
#[must_use]
pub fn authorization_value(token: &str) -> String {
    format!("Token {token}")
}

/// Represents the API endpoints this client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint<'a> {
    CreatePrediction,
    ListPredictions,
    GetPrediction { id: &'a str },
    CancelPrediction { id: &'a str },
    ListModels,
    GetModel { owner: &'a str, name: &'a str },
    CreateModelPrediction { owner: &'a str, name: &'a str },
    ListVersions { owner: &'a str, name: &'a str },
    GetVersion {
        owner: &'a str,
        name: &'a str,
        id: &'a str,
    },
    ListCollections,
    GetCollection { slug: &'a str },
    CreateDeploymentPrediction { owner: &'a str, name: &'a str },
    DefaultWebhookSecret,
    CreateFile,
    ListFiles,
    GetFile { id: &'a str },
    DeleteFile { id: &'a str },
}

impl Endpoint<'_> {
    /// Constructs the URL path for this endpoint.
    ///
    /// Caller-supplied segments are percent-encoded.
    fn to_path(&self, version: ApiVersion) -> String {
        fn enc(segment: &str) -> String {
            urlencoding::encode(segment).into_owned()
        }

        let v = version.as_str();
        match self {
            Self::CreatePrediction | Self::ListPredictions => format!("/{v}/predictions"),
            Self::GetPrediction { id } => format!("/{v}/predictions/{}", enc(id)),
            Self::CancelPrediction { id } => format!("/{v}/predictions/{}/cancel", enc(id)),
            Self::ListModels => format!("/{v}/models"),
            Self::GetModel { owner, name } => format!("/{v}/models/{}/{}", enc(owner), enc(name)),
            Self::CreateModelPrediction { owner, name } => {
                format!("/{v}/models/{}/{}/predictions", enc(owner), enc(name))
            }
            Self::ListVersions { owner, name } => {
                format!("/{v}/models/{}/{}/versions", enc(owner), enc(name))
            }
            Self::GetVersion { owner, name, id } => format!(
                "/{v}/models/{}/{}/versions/{}",
                enc(owner),
                enc(name),
                enc(id)
            ),
            Self::ListCollections => format!("/{v}/collections"),
            Self::GetCollection { slug } => format!("/{v}/collections/{}", enc(slug)),
            Self::CreateDeploymentPrediction { owner, name } => {
                format!("/{v}/deployments/{}/{}/predictions", enc(owner), enc(name))
            }
            Self::DefaultWebhookSecret => format!("/{v}/webhooks/default/secret"),
            Self::CreateFile | Self::ListFiles => format!("/{v}/files"),
            Self::GetFile { id } | Self::DeleteFile { id } => format!("/{v}/files/{}", enc(id)),
        }
    }

    /// Returns the request target for this endpoint, relative to the base URL.
    #[must_use]
    pub fn path(&self) -> String {
        self.to_path(ApiVersion::V1)
    }
}

/// Joins a request target onto the base URL.
///
/// Absolute URLs (prediction `urls`, pagination cursors) are used verbatim.
#[must_use]
pub fn resolve_url(base_url: &str, target: &str) -> String {
    if target.starts_with("https://") || target.starts_with("http://") {
        target.to_string()
    } else if target.starts_with('/') {
        format!("{}{target}", base_url.trim_end_matches('/'))
    } else {
        format!("{}/{target}", base_url.trim_end_matches('/'))
    }
}

/// Splits an `owner/name` model reference.
pub fn split_owner_name(reference: &str) -> Option<(&str, &str)> {
    let (owner, name) = reference.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        None
    } else {
        Some((owner, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_paths() {
        assert_eq!(Endpoint::CreatePrediction.path(), "/v1/predictions");
        assert_eq!(Endpoint::ListPredictions.path(), "/v1/predictions");
        assert_eq!(
            Endpoint::GetPrediction { id: "ufawqhfynnddngldkgtslldrkq" }.path(),
            "/v1/predictions/ufawqhfynnddngldkgtslldrkq"
        );
        assert_eq!(
            Endpoint::CancelPrediction { id: "abc" }.path(),
            "/v1/predictions/abc/cancel"
        );
    }

    #[test]
    fn test_model_paths() {
        assert_eq!(
            Endpoint::GetModel { owner: "stability-ai", name: "sdxl" }.path(),
            "/v1/models/stability-ai/sdxl"
        );
        assert_eq!(
            Endpoint::GetVersion { owner: "stability-ai", name: "sdxl", id: "39ed52f2" }.path(),
            "/v1/models/stability-ai/sdxl/versions/39ed52f2"
        );
        assert_eq!(
            Endpoint::CreateModelPrediction { owner: "meta", name: "llama" }.path(),
            "/v1/models/meta/llama/predictions"
        );
    }

    #[test]
    fn test_other_paths() {
        assert_eq!(Endpoint::ListCollections.path(), "/v1/collections");
        assert_eq!(
            Endpoint::GetCollection { slug: "text-to-image" }.path(),
            "/v1/collections/text-to-image"
        );
        assert_eq!(
            Endpoint::CreateDeploymentPrediction { owner: "acme", name: "my-app" }.path(),
            "/v1/deployments/acme/my-app/predictions"
        );
        assert_eq!(Endpoint::DefaultWebhookSecret.path(), "/v1/webhooks/default/secret");
        assert_eq!(Endpoint::CreateFile.path(), "/v1/files");
        assert_eq!(Endpoint::DeleteFile { id: "f1" }.path(), "/v1/files/f1");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(
            Endpoint::GetPrediction { id: "a/b?c" }.path(),
            "/v1/predictions/a%2Fb%3Fc"
        );
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        assert_eq!(
            resolve_url("https://api.replicate.com", "/v1/predictions"),
            "https://api.replicate.com/v1/predictions"
        );
        assert_eq!(
            resolve_url("https://api.replicate.com/", "/v1/predictions"),
            "https://api.replicate.com/v1/predictions"
        );
        assert_eq!(
            resolve_url("http://localhost:1234", "v1/predictions"),
            "http://localhost:1234/v1/predictions"
        );
        let cursor = "https://api.replicate.com/v1/predictions?cursor=cD0yMDIy";
        assert_eq!(resolve_url("http://localhost:1234", cursor), cursor);
    }

    #[test]
    fn test_split_owner_name() {
        assert_eq!(split_owner_name("stability-ai/sdxl"), Some(("stability-ai", "sdxl")));
        assert_eq!(split_owner_name("sdxl"), None);
        assert_eq!(split_owner_name("/sdxl"), None);
        assert_eq!(split_owner_name("a/b/c"), None);
    }

    #[test]
    fn test_headers() {
        assert_eq!(authorization_value("r8_abc"), "Token r8_abc");
        assert!(USER_AGENT.starts_with("replicate-rs@"));
    }
}
