//! Route definitions for the FirmScope API.

pub mod health;
pub mod projects;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Firmware images run large; cap uploads at 2 GiB.
const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let project_routes = Router::new()
        .route(
            "/projects",
            get(projects::list).post(projects::create),
        )
        .route(
            "/projects/{id}",
            get(projects::get_by_id).delete(projects::delete),
        )
        .route("/projects/{id}/findings", get(projects::findings))
        .route("/projects/{id}/cves", get(projects::cves))
        .route("/projects/{id}/osint", get(projects::osint))
        .route("/projects/{id}/summary", get(projects::summary))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", project_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
