//! Scripted in-process transport for tests/dev.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::transport::{ProviderRequest, ProviderResponse, ProviderTransport, TransportError};

/// Replays queued responses in order and records every request it receives.
///
/// Once the script runs out, every further call fails with a network error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ProviderResponse, TransportError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fixed list of responses.
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<ProviderResponse, TransportError>>,
    ) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn push(&self, response: Result<ProviderResponse, TransportError>) {
        self.script.lock().await.push_back(response);
    }

    pub async fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(ProviderResponse::new(status, body.to_string())))
            .await;
    }

    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        self.requests.lock().await.push(request);
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string())))
    }
}
