use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use personaforge_infra::{GetJobStatus, JobPayload, LaunchJobRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_job))
        .route("/:job_id", get(get_job))
}

/// Launch a job and poll it until the client deadline.
///
/// 200 when the job finished in time, 202 when it continues in the background.
pub async fn submit_job(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitJobRequest>,
) -> axum::response::Response {
    let kind = match errors::parse_kind(&body.kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let owner_id = match errors::parse_owner_id(&body.owner_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = LaunchJobRequest {
        kind,
        owner_id,
        payload: JobPayload::from_fields(body.payload),
    };

    match services.orchestrator.submit(request).await {
        Ok(outcome) => {
            let status = if outcome.handed_off {
                StatusCode::ACCEPTED
            } else {
                StatusCode::OK
            };
            (
                status,
                Json(dto::JobResponse::from_job(outcome.job, outcome.handed_off)),
            )
                .into_response()
        }
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match errors::parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orchestrator.status(GetJobStatus::Job(job_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}
