use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use personaforge_core::{Job, JobId, JobKind, JobStatus, Metadata, OwnerId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: String,
    pub owner_id: String,
    /// Provider-specific creation fields, forwarded as the JSON body.
    #[serde(default)]
    pub payload: Metadata,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub provider: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub external_id: Option<String>,
    pub result_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub attempts: u32,
    /// Still running on a background task.
    pub handed_off: bool,
}

impl JobResponse {
    pub fn from_job(job: Job, handed_off: bool) -> Self {
        Self {
            job_id: job.id,
            owner_id: job.owner_id,
            provider: job.provider,
            kind: job.kind,
            status: job.status,
            external_id: job.external_id,
            result_ref: job.result_ref,
            failure_reason: job.failure_reason,
            submitted_at: job.submitted_at,
            deadline: job.deadline,
            attempts: job.attempts,
            handed_off,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub provider: String,
    pub kind: JobKind,
    pub api_key: String,
}
