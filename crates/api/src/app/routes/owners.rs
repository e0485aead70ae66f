use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use personaforge_infra::GetJobStatus;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:owner_id/jobs/:kind", get(get_owner_job))
}

/// Latest state for an owner and kind: live job, persisted record, or the
/// provider's default.
pub async fn get_owner_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path((owner_id, kind)): Path<(String, String)>,
) -> axum::response::Response {
    let owner_id = match errors::parse_owner_id(&owner_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind = match errors::parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .status(GetJobStatus::Owner { owner_id, kind })
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}
