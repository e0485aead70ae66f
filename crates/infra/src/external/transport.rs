use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use personaforge_providers::AuthStyle;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A file part of a creation payload (images, audio, video).
#[derive(Clone, PartialEq, Eq)]
pub struct PayloadFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl core::fmt::Debug for PayloadFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PayloadFile")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(JsonValue),
    /// Text fields plus file parts, sent as `multipart/form-data`.
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<PayloadFile>,
    },
}

/// One outbound call to a provider candidate.
#[derive(Clone, PartialEq)]
pub struct ProviderRequest {
    pub method: HttpMethod,
    pub url: String,
    pub auth: AuthStyle,
    pub api_key: Option<String>,
    pub body: RequestBody,
}

impl core::fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("auth", &self.auth)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Sends provider requests.
///
/// Implementations must not interpret status codes; classification belongs to
/// the candidate set.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError>;
}

#[async_trait]
impl<T> ProviderTransport for std::sync::Arc<T>
where
    T: ProviderTransport + ?Sized,
{
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        (**self).send(request).await
    }
}
