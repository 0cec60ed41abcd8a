//! HTTP API for submitting jobs and polling their state
//!
//! This module provides the REST surface over the job core:
//! - POST /jobs - Submit an audio path or transcript text
//! - GET /jobs - List all jobs
//! - GET /jobs/:id - Status plus advisory progress
//! - GET /jobs/:id/result - Outputs of a completed job
//! - DELETE /jobs/:id - Remove a job and its progress entry
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{JobResultResponse, JobStatusResponse, SubmitJobRequest, SubmitJobResponse};
pub use routes::create_router;
pub use state::AppState;
