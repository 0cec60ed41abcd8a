use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Submission and listing
        .route(
            "/jobs",
            post(handlers::submit_job).get(handlers::list_jobs),
        )
        // Per-job status and deletion
        .route(
            "/jobs/:job_id",
            get(handlers::get_job_status).delete(handlers::delete_job),
        )
        // Outputs of a completed job
        .route("/jobs/:job_id/result", get(handlers::get_job_result))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
