use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use personaforge_core::{JobId, JobKind, OwnerId};
use personaforge_infra::{LaunchError, OrchestratorError, PollError};

pub fn orchestrator_error_to_response(err: OrchestratorError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        OrchestratorError::Launch(LaunchError::Quota { .. })
        | OrchestratorError::Poll(PollError::Quota { .. }) => {
            json_error(StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", message)
        }
        OrchestratorError::Launch(LaunchError::Rejected { .. })
        | OrchestratorError::Poll(PollError::Rejected { .. }) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "provider_rejected", message)
        }
        OrchestratorError::Launch(LaunchError::Exhausted { .. })
        | OrchestratorError::Poll(PollError::Exhausted { .. }) => {
            json_error(StatusCode::BAD_GATEWAY, "provider_unavailable", message)
        }
        OrchestratorError::Launch(LaunchError::UnknownProvider(_))
        | OrchestratorError::Poll(PollError::UnknownProvider { .. })
        | OrchestratorError::UnknownProvider(_) => {
            json_error(StatusCode::BAD_REQUEST, "unsupported_kind", message)
        }
        OrchestratorError::JobNotFound(_) | OrchestratorError::NothingRecorded { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        OrchestratorError::Poll(PollError::MissingId(_)) => {
            json_error(StatusCode::BAD_GATEWAY, "provider_unavailable", message)
        }
        OrchestratorError::Store(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_kind(s: &str) -> Result<JobKind, axum::response::Response> {
    s.parse::<JobKind>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_kind",
            "kind must be one of: face_embedding, video_avatar, lipsync_video, voice_clone",
        )
    })
}

pub fn parse_owner_id(s: &str) -> Result<OwnerId, axum::response::Response> {
    s.parse::<OwnerId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_owner_id", e.to_string()))
}

pub fn parse_job_id(s: &str) -> Result<JobId, axum::response::Response> {
    s.parse::<JobId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_job_id", e.to_string()))
}
