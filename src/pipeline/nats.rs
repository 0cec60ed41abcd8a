use super::{check_sentinel, Pipeline, PipelineError, PipelineResult};
use crate::job::JobOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    input_ref: &'a str,
    transcription_client: &'a str,
    transcription_model: &'a str,
    chunk_size_mb: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    transcript: &'a str,
    llm_client: &'a str,
    llm_model: &'a str,
}

#[derive(Deserialize)]
struct TextReply {
    text: String,
}

/// Pipeline client speaking JSON request/reply over NATS to the external
/// transcription/summarization service.
///
/// Subjects are `<prefix>.transcribe`, `<prefix>.minutes`, and
/// `<prefix>.mindmap`. A request error (no responder, timeout, bad reply)
/// maps to `PipelineError::Transport`; sentinel payloads in an otherwise
/// successful reply map to `PipelineError::Provider`.
pub struct NatsPipeline {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsPipeline {
    pub fn new(client: async_nats::Client, subject_prefix: String) -> Self {
        Self {
            client,
            subject_prefix,
        }
    }

    async fn request<T: Serialize>(&self, op: &str, body: &T) -> PipelineResult<Vec<u8>> {
        let payload =
            serde_json::to_vec(body).map_err(|e| PipelineError::Transport(e.to_string()))?;

        let reply = self
            .client
            .request(format!("{}.{op}", self.subject_prefix), payload.into())
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        Ok(reply.payload.to_vec())
    }

    async fn request_text<T: Serialize>(&self, op: &str, body: &T) -> PipelineResult<String> {
        let payload = self.request(op, body).await?;
        let reply: TextReply = serde_json::from_slice(&payload)
            .map_err(|e| PipelineError::Transport(format!("unreadable {op} reply: {e}")))?;
        check_sentinel(reply.text)
    }
}

#[async_trait]
impl Pipeline for NatsPipeline {
    async fn transcribe(
        &self,
        input_ref: &str,
        options: &JobOptions,
        chunk_size_mb: u32,
    ) -> PipelineResult<String> {
        self.request_text(
            "transcribe",
            &TranscribeRequest {
                input_ref,
                transcription_client: &options.transcription_client,
                transcription_model: &options.transcription_model,
                chunk_size_mb,
            },
        )
        .await
    }

    async fn summarize(&self, transcript: &str, options: &JobOptions) -> PipelineResult<String> {
        self.request_text(
            "minutes",
            &GenerateRequest {
                transcript,
                llm_client: &options.llm_client,
                llm_model: &options.llm_model,
            },
        )
        .await
    }

    async fn mindmap(
        &self,
        transcript: &str,
        options: &JobOptions,
    ) -> PipelineResult<serde_json::Value> {
        let payload = self
            .request(
                "mindmap",
                &GenerateRequest {
                    transcript,
                    llm_client: &options.llm_client,
                    llm_model: &options.llm_model,
                },
            )
            .await?;

        let value: serde_json::Value = serde_json::from_slice(&payload)
            .map_err(|e| PipelineError::Transport(format!("unreadable mindmap reply: {e}")))?;

        // A bare sentinel string in place of a tree is still a provider
        // failure.
        if let Some(text) = value.as_str() {
            check_sentinel(text.to_string())?;
        }

        Ok(value)
    }
}
