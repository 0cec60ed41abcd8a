// Shared fixtures for the integration tests: an in-memory SQLite job
// store, a progress store that records every write, and a scripted
// pipeline fake standing in for the external transcription service.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use transmeet_server::pipeline::{check_sentinel, Pipeline, PipelineError, PipelineResult};
use transmeet_server::progress::{MemoryProgress, ProgressStore};
use transmeet_server::{JobOptions, JobSource, JobStore, NewJob};

/// Job store on a private in-memory SQLite database. A single pooled
/// connection keeps every query on the same database.
pub async fn memory_store() -> Result<JobStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    let store = JobStore::new(pool);
    store.migrate().await?;
    Ok(store)
}

/// Job store on a SQLite database file, for tests that reopen the same
/// database across connections.
pub async fn file_store(path: &std::path::Path) -> Result<JobStore> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await?;

    let store = JobStore::new(pool);
    store.migrate().await?;
    Ok(store)
}

pub fn audio_job(input_ref: &str) -> NewJob {
    NewJob {
        source: JobSource::Audio,
        input_ref: input_ref.to_string(),
        options: JobOptions::default(),
    }
}

pub fn text_job(transcript: &str) -> NewJob {
    NewJob {
        source: JobSource::Text,
        input_ref: transcript.to_string(),
        options: JobOptions::default(),
    }
}

/// Progress store that additionally records the sequence of percentages
/// written, so tests can assert the shape of what a polling client saw.
#[derive(Default)]
pub struct RecordingProgress {
    inner: MemoryProgress,
    writes: Mutex<Vec<u8>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressStore for RecordingProgress {
    async fn set(&self, job_id: &str, percent: u8) -> Result<()> {
        self.writes.lock().unwrap().push(percent);
        self.inner.set(job_id, percent).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<u8>> {
        self.inner.get(job_id).await
    }

    async fn clear(&self, job_id: &str) -> Result<()> {
        self.inner.clear(job_id).await
    }
}

/// Canned per-stage replies. `Err` strings become transport errors; `Ok`
/// text goes through the same sentinel normalization the real pipeline
/// client applies, so `Ok("Error: ...")` behaves like a provider failure.
pub struct ScriptedPipeline {
    pub transcript_reply: Result<String, String>,
    pub minutes_reply: Result<String, String>,
    pub mindmap_reply: Result<serde_json::Value, String>,
    transcribe_calls: AtomicUsize,
}

impl ScriptedPipeline {
    pub fn happy() -> Self {
        Self {
            transcript_reply: Ok("Alice: shipping is on track. Bob: demo on Friday.".to_string()),
            minutes_reply: Ok("# Minutes\n\n- Shipping on track\n- Demo on Friday".to_string()),
            mindmap_reply: Ok(serde_json::json!({
                "Root Topic": "Standup",
                "Shipping": ["on track"],
                "Demo": ["Friday"],
            })),
            transcribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_transcript_reply(mut self, reply: Result<String, String>) -> Self {
        self.transcript_reply = reply;
        self
    }

    pub fn with_minutes_reply(mut self, reply: Result<String, String>) -> Self {
        self.minutes_reply = reply;
        self
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }
}

fn scripted_text(reply: &Result<String, String>) -> PipelineResult<String> {
    match reply {
        Ok(text) => check_sentinel(text.clone()),
        Err(message) => Err(PipelineError::Transport(message.clone())),
    }
}

#[async_trait]
impl Pipeline for ScriptedPipeline {
    async fn transcribe(
        &self,
        _input_ref: &str,
        _options: &JobOptions,
        _chunk_size_mb: u32,
    ) -> PipelineResult<String> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        scripted_text(&self.transcript_reply)
    }

    async fn summarize(&self, _transcript: &str, _options: &JobOptions) -> PipelineResult<String> {
        scripted_text(&self.minutes_reply)
    }

    async fn mindmap(
        &self,
        _transcript: &str,
        _options: &JobOptions,
    ) -> PipelineResult<serde_json::Value> {
        match &self.mindmap_reply {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(PipelineError::Transport(message.clone())),
        }
    }
}
