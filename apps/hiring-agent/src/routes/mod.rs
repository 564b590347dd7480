pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.upload_limit;

    Router::new()
        .route("/health", get(health::health_handler))
        // Pipeline API
        .route(
            "/api/v1/pipelines/:id/process",
            post(handlers::handle_process),
        )
        .route(
            "/api/v1/pipelines/:id/status",
            post(handlers::handle_set_status),
        )
        .route("/api/v1/pipelines/:id/stats", get(handlers::handle_stats))
        .route(
            "/api/v1/pipelines/:id/candidates/:cid",
            get(handlers::handle_get_candidate),
        )
        .route(
            "/api/v1/pipelines/:id/candidates/:cid/review",
            post(handlers::handle_review),
        )
        .route(
            "/api/v1/pipelines/:id/resumes",
            post(handlers::handle_upload_resumes).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Assessment subsystems
        .route(
            "/api/v1/assessments/events",
            post(handlers::handle_assessment_event),
        )
        .with_state(state)
}
