//! Job submission with candidate fallback.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use personaforge_core::{Job, JobKind, JobStatus, Metadata, OwnerId};
use personaforge_providers::{NormalizedResponse, ProviderCatalog};

use super::probe::{probe, Failures, ProbeOutcome};
use crate::external::{HttpMethod, PayloadFile, ProviderTransport, RequestBody};

/// Provider-specific creation payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Text/JSON fields.
    #[serde(default)]
    pub fields: Metadata,
    /// File parts; when present the request is sent as multipart.
    #[serde(skip)]
    pub files: Vec<PayloadFile>,
}

impl JobPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Metadata) -> Self {
        Self {
            fields,
            files: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_file(mut self, file: PayloadFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn to_body(&self) -> RequestBody {
        if self.files.is_empty() {
            return RequestBody::Json(JsonValue::Object(self.fields.clone()));
        }
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect();
        RequestBody::Multipart {
            fields,
            files: self.files.clone(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    #[error("no provider registered for {0}")]
    UnknownProvider(JobKind),

    #[error("{provider}: quota exceeded: {message}")]
    Quota { provider: String, message: String },

    #[error("{provider} rejected the job (HTTP {status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider}: all {} candidates failed: {failures}", .failures.len())]
    Exhausted { provider: String, failures: Failures },
}

/// Submits creation requests.
pub struct JobLauncher<T: ?Sized> {
    transport: Arc<T>,
    catalog: Arc<ProviderCatalog>,
}

impl<T: ?Sized> Clone for JobLauncher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<T> JobLauncher<T>
where
    T: ProviderTransport + ?Sized,
{
    pub fn new(transport: Arc<T>, catalog: Arc<ProviderCatalog>) -> Self {
        Self { transport, catalog }
    }

    /// Submit a job to the provider registered for `kind`.
    ///
    /// Returns a `Queued`/`Processing` job with its provider id, or a terminal
    /// job when the creation response already carries a result (or a failure).
    pub async fn launch(
        &self,
        owner_id: OwnerId,
        kind: JobKind,
        payload: &JobPayload,
    ) -> Result<Job, LaunchError> {
        let set = self
            .catalog
            .for_kind(kind)
            .ok_or(LaunchError::UnknownProvider(kind))?;
        let api_key = self
            .catalog
            .config(&set.provider)
            .and_then(|c| c.api_key.as_deref());

        let candidates = set.create_candidates();
        let outcome = probe(
            self.transport.as_ref(),
            set,
            api_key,
            &candidates,
            HttpMethod::Post,
            &payload.to_body(),
            NormalizedResponse::has_handle,
        )
        .await;

        match outcome {
            ProbeOutcome::Accepted {
                normalized,
                endpoint,
                attempts,
            } => {
                let job = job_from_creation(owner_id, &set.provider, kind, normalized);
                info!(
                    job_id = %job.id,
                    owner_id = %owner_id,
                    provider = %set.provider,
                    kind = %kind,
                    external_id = ?job.external_id,
                    status = %job.status,
                    endpoint = %endpoint,
                    attempts,
                    "job launched"
                );
                Ok(job)
            }
            ProbeOutcome::Quota {
                endpoint, message, ..
            } => {
                warn!(provider = %set.provider, endpoint = %endpoint, message = %message, "launch stopped: quota exceeded");
                Err(LaunchError::Quota {
                    provider: set.provider.clone(),
                    message,
                })
            }
            ProbeOutcome::Rejected {
                endpoint,
                status,
                message,
                ..
            } => {
                warn!(provider = %set.provider, endpoint = %endpoint, status, message = %message, "launch rejected");
                Err(LaunchError::Rejected {
                    provider: set.provider.clone(),
                    status,
                    message,
                })
            }
            ProbeOutcome::Exhausted { failures } => {
                warn!(provider = %set.provider, failures = %failures, "launch candidates exhausted");
                Err(LaunchError::Exhausted {
                    provider: set.provider.clone(),
                    failures,
                })
            }
        }
    }
}

fn job_from_creation(
    owner_id: OwnerId,
    provider: &str,
    kind: JobKind,
    normalized: NormalizedResponse,
) -> Job {
    let mut job = Job::new(owner_id, provider, kind);
    job.external_id = normalized.id.clone();

    // Without an id there is nothing to poll, so a result is final.
    let result_is_final = normalized.status.is_none() || job.external_id.is_none();
    match (normalized.job_status(), normalized.result_ref) {
        (Some(JobStatus::Failed), _) => {
            job.mark_failed(normalized.message);
        }
        (Some(JobStatus::Ready), result) => {
            job.mark_ready(result);
        }
        // Synchronous providers answer with the artifact itself.
        (_, Some(result)) if result_is_final => {
            job.mark_ready(Some(result));
        }
        (Some(status), _) => {
            job.observe(status);
        }
        (None, _) => {}
    }
    job
}
