use super::mindmap::MindMapNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
///
/// Transitions are `Queued -> Processing -> {Completed | Failed}`. The
/// terminal states are final for a single task attempt; a failed job may be
/// re-enqueued as a fresh task against the same id and re-enter
/// `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// What kind of artifact was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobSource {
    /// An uploaded audio file; `input_ref` is its path.
    Audio,
    /// A pasted or uploaded transcript; `input_ref` is the text itself.
    Text,
}

/// Provider and model selection for a job, immutable once queued. Each
/// field defaults independently, so a submission may override just one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default = "default_transcription_client")]
    pub transcription_client: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_llm_client")]
    pub llm_client: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
}

fn default_transcription_client() -> String {
    "groq".to_string()
}

fn default_transcription_model() -> String {
    "whisper-large-v3-turbo".to_string()
}

fn default_llm_client() -> String {
    "groq".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            transcription_client: default_transcription_client(),
            transcription_model: default_transcription_model(),
            llm_client: default_llm_client(),
            llm_model: default_llm_model(),
        }
    }
}

/// A job as read back from the record store.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub source: JobSource,
    pub input_ref: String,
    pub status: JobStatus,
    pub options: JobOptions,

    /// Outputs, populated monotonically on the success path. Once a field
    /// is set it is never replaced by an empty value on redelivery.
    pub transcript: Option<String>,
    pub minutes: Option<String>,
    pub mind_map: Option<MindMapNode>,

    /// Human-readable failure detail, set only when `status == Failed`.
    pub error_detail: Option<String>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Inputs needed to create a job record. The id, status, and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source: JobSource,
    pub input_ref: String,
    pub options: JobOptions,
}

/// The full output payload a worker commits on success.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutputs {
    pub transcript: String,
    pub minutes: String,
    pub mind_map: MindMapNode,
}
