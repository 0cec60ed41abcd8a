//! Durable task queue
//!
//! Producers append task descriptors with `enqueue` and never wait on a
//! consumer. Workers pull with `dequeue`, which hands each task to exactly
//! one worker at a time as a `TaskLease`. A lease that is dropped without
//! being acked (worker crash, process kill) becomes deliverable again once
//! its visibility timeout lapses, so delivery is at-least-once and the job
//! state machine stays idempotent on redelivery.

mod jetstream;
mod memory;

pub use jetstream::JetStreamQueue;
pub use memory::MemoryQueue;

use crate::job::{Job, JobOptions, JobSource};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One queued unit of work. Carries everything a worker needs so that it
/// only has to consult the record store for lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub job_id: String,
    pub source: JobSource,
    pub input_ref: String,
    pub options: JobOptions,
}

impl TaskMessage {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            source: job.source,
            input_ref: job.input_ref.clone(),
            options: job.options.clone(),
        }
    }
}

/// A task handed to a single worker. `ack` consumes the lease and removes
/// the task permanently; a lease that is never acked is redelivered.
#[async_trait]
pub trait TaskLease: Send {
    fn task(&self) -> &TaskMessage;

    async fn ack(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a task durably. Errors surface to the producer synchronously;
    /// a submission must never be left half-done with a queued record and
    /// no task.
    async fn enqueue(&self, task: &TaskMessage) -> Result<()>;

    /// Wait up to `wait` for a task. `Ok(None)` means the queue stayed
    /// empty; ordering across different jobs is not guaranteed.
    async fn dequeue(&self, wait: Duration) -> Result<Option<Box<dyn TaskLease>>>;
}
