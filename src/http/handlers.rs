use super::state::AppState;
use crate::job::{Job, JobOptions, JobSource, JobStatus, MindMapNode, NewJob};
use crate::queue::TaskMessage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub source: JobSource,

    /// Path of the stored artifact; required for audio submissions.
    pub input_ref: Option<String>,

    /// Inline transcript content; required for text submissions.
    pub text: Option<String>,

    /// Provider/model selection; any field left unset falls back to its
    /// default, as does the whole object when omitted.
    #[serde(default)]
    pub options: Option<JobOptions>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub source: JobSource,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub transcript_available: bool,
    pub minutes_available: bool,
    pub mind_map_available: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    pub id: String,
    pub transcript: Option<String>,
    pub minutes: Option<String>,
    pub mind_map: Option<MindMapNode>,
}

#[derive(Debug, Serialize)]
pub struct DeleteJobResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /jobs
/// Create a job record and enqueue its task. If the enqueue fails the
/// record is rolled back so no `queued` job can exist without a task.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(req): Json<SubmitJobRequest>,
) -> impl IntoResponse {
    let input_ref = match (req.source, req.input_ref, req.text) {
        (JobSource::Audio, Some(input_ref), _) => input_ref,
        (JobSource::Audio, None, _) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "audio submissions require input_ref",
            );
        }
        (JobSource::Text, _, Some(text)) if !text.trim().is_empty() => text,
        (JobSource::Text, _, _) => {
            return error_response(StatusCode::BAD_REQUEST, "text submissions require text");
        }
    };

    let new_job = NewJob {
        source: req.source,
        input_ref,
        options: req.options.unwrap_or_default(),
    };

    let job = match state.store.create(new_job).await {
        Ok(job) => job,
        Err(e) => {
            error!(error = %e, "failed to create job record");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to create job");
        }
    };

    if let Err(e) = state.queue.enqueue(&TaskMessage::for_job(&job)).await {
        error!(job = %job.id, error = %e, "failed to enqueue task, rolling back record");
        if let Err(del) = state.store.delete(&job.id).await {
            error!(job = %job.id, error = %del, "rollback of unqueued job record failed");
        }
        return error_response(StatusCode::BAD_GATEWAY, "task queue unavailable");
    }

    info!(job = %job.id, source = ?job.source, "job submitted");

    (
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            id: job.id,
            status: job.status,
        }),
    )
        .into_response()
}

/// GET /jobs
/// List all jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(jobs) => {
            let mut responses = Vec::with_capacity(jobs.len());
            for job in jobs {
                let progress = read_progress(&state, &job).await;
                responses.push(status_response(job, progress));
            }
            (StatusCode::OK, Json(responses)).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to list jobs");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list jobs")
        }
    }
}

/// GET /jobs/:job_id
/// Authoritative status plus the advisory progress percentage.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&job_id).await {
        Ok(Some(job)) => {
            let progress = read_progress(&state, &job).await;
            (StatusCode::OK, Json(status_response(job, progress))).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("job {job_id} not found")),
        Err(e) => {
            error!(job = %job_id, error = %e, "failed to load job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load job")
        }
    }
}

/// GET /jobs/:job_id/result
/// Output payloads for a completed job.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&job_id).await {
        Ok(Some(job)) if job.status == JobStatus::Completed => (
            StatusCode::OK,
            Json(JobResultResponse {
                id: job.id,
                transcript: job.transcript,
                minutes: job.minutes,
                mind_map: job.mind_map,
            }),
        )
            .into_response(),
        Ok(Some(_)) | Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("job {job_id} not found or not complete"),
        ),
        Err(e) => {
            error!(job = %job_id, error = %e, "failed to load job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load job")
        }
    }
}

/// DELETE /jobs/:job_id
/// Remove the record and its progress entry. From the client's view this
/// is one operation even though it is two writes.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = state.progress.clear(&job_id).await {
        warn!(job = %job_id, error = %e, "failed to clear progress during delete");
    }

    match state.store.delete(&job_id).await {
        Ok(true) => {
            info!(job = %job_id, "job deleted");
            (StatusCode::OK, Json(DeleteJobResponse { success: true })).into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("job {job_id} not found")),
        Err(e) => {
            error!(job = %job_id, error = %e, "failed to delete job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to delete job")
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Progress is advisory: absence reads as 0, a completed job reads as 100
/// even after the store entry expired, and a failed job reads as 0 because
/// its entry is cleared on failure.
async fn read_progress(state: &AppState, job: &Job) -> u8 {
    match job.status {
        JobStatus::Completed => 100,
        JobStatus::Failed => 0,
        _ => state
            .progress
            .get(&job.id)
            .await
            .unwrap_or_else(|e| {
                warn!(job = %job.id, error = %e, "failed to read progress");
                None
            })
            .unwrap_or(0),
    }
}

fn status_response(job: Job, progress: u8) -> JobStatusResponse {
    JobStatusResponse {
        id: job.id,
        source: job.source,
        status: job.status,
        progress,
        error: job.error_detail,
        transcript_available: job.transcript.is_some(),
        minutes_available: job.minutes.is_some(),
        mind_map_available: job.mind_map.is_some(),
        created_at: job.created_at,
        completed_at: job.completed_at,
    }
}
