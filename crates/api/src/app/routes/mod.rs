use axum::Router;

pub mod jobs;
pub mod owners;
pub mod providers;
pub mod system;

/// Router for all job and owner endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/owners", owners::router())
        .nest("/providers", providers::router())
}
