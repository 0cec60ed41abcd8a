//! The external transcription / summarization pipeline seam
//!
//! The provider calls themselves are a black box behind the `Pipeline`
//! trait; this module only fixes the contract. Failures cross the boundary
//! as data: a typed `PipelineError` rather than a caught panic, and the
//! providers' habit of returning a success-shaped string that starts with
//! `"Error:"` is normalized into `PipelineError::Provider` right here, so
//! the worker branches on `Result` alone.

mod nats;

pub use nats::NatsPipeline;

use crate::job::JobOptions;
use async_trait::async_trait;
use thiserror::Error;

/// Prefix some providers put on a payload that semantically encodes
/// failure. Treated exactly like a transport error.
pub const ERROR_SENTINEL: &str = "Error:";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The provider answered, but with a failure (including sentinel
    /// payloads).
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider could not be reached or the reply was unreadable.
    #[error("pipeline transport error: {0}")]
    Transport(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Audio chunk size handed to the transcription provider, in megabytes.
/// Pass-through configuration: the pipeline does the actual splitting.
pub fn chunk_size_mb(transcription_client: &str) -> u32 {
    match transcription_client {
        "groq" => 18,
        "openai" => 24,
        _ => 18,
    }
}

/// Reject success-shaped payloads that carry the error sentinel.
pub fn check_sentinel(text: String) -> PipelineResult<String> {
    if text.trim_start().starts_with(ERROR_SENTINEL) {
        Err(PipelineError::Provider(text))
    } else {
        Ok(text)
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Transcribe the artifact behind `input_ref` with the job's chosen
    /// provider and model, splitting audio into `chunk_size_mb` chunks.
    async fn transcribe(
        &self,
        input_ref: &str,
        options: &JobOptions,
        chunk_size_mb: u32,
    ) -> PipelineResult<String>;

    /// Generate meeting minutes (markdown) from a transcript.
    async fn summarize(&self, transcript: &str, options: &JobOptions) -> PipelineResult<String>;

    /// Generate a mind map from a transcript. The payload shape is the
    /// provider's; callers normalize it with `MindMapNode::normalize`.
    async fn mindmap(
        &self,
        transcript: &str,
        options: &JobOptions,
    ) -> PipelineResult<serde_json::Value>;
}
