//! Web API router construction.

use crate::state::AppState;
use crate::web::{generate, status};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Creates the web server router.
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/generate", post(generate::submit))
        .route("/generate/jobs", get(generate::list_jobs))
        .route("/generate/{job_id}/status", get(generate::job_status))
        .route("/generate/{job_id}/result", get(generate::job_result))
        .route("/generate/{job_id}/cancel", post(generate::cancel_job))
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        TraceLayer::new_for_http(),
        CompressionLayer::new(),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}
