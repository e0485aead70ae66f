//! reqwest-backed provider transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use personaforge_providers::AuthStyle;

use super::transport::{
    HttpMethod, ProviderRequest, ProviderResponse, ProviderTransport, RequestBody, TransportError,
};

/// Shared HTTP client for all providers.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderTransport for ReqwestTransport {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        if let Some(key) = request.api_key.as_deref() {
            builder = match &request.auth {
                AuthStyle::Bearer => builder.bearer_auth(key),
                AuthStyle::Header { name } => builder.header(name.as_str(), key),
                AuthStyle::Query { param } => builder.query(&[(param.as_str(), key)]),
            };
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { fields, files } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                for file in files {
                    let mut part = Part::bytes(file.bytes).file_name(file.filename);
                    if let Some(ct) = file.content_type.as_deref() {
                        part = part
                            .mime_str(ct)
                            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                    }
                    form = form.part(file.field, part);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(ProviderResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
