//! Dev-only credential exposure.
//!
//! Lets a local client talk to a provider directly. Off unless
//! `PERSONAFORGE_EXPOSE_CREDENTIALS` is set; when off the route answers 404 so
//! its existence is not advertised.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::warn;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:kind/credentials", get(get_credentials))
}

pub async fn get_credentials(
    Extension(services): Extension<Arc<AppServices>>,
    Path(kind): Path<String>,
) -> axum::response::Response {
    if !services.expose_credentials {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found");
    }
    let kind = match errors::parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let catalog = services.orchestrator.catalog();
    let Some(set) = catalog.for_kind(kind) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("no provider for {kind}"));
    };
    let Some(api_key) = catalog.config(&set.provider).and_then(|c| c.api_key.clone()) else {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no credential configured for {}", set.provider),
        );
    };

    warn!(provider = %set.provider, kind = %kind, "provider credential handed to caller");
    (
        StatusCode::OK,
        Json(dto::CredentialResponse {
            provider: set.provider.clone(),
            kind,
            api_key,
        }),
    )
        .into_response()
}
