//! Worker execution loop
//!
//! Each worker pulls one task at a time from the shared queue, drives the
//! job through the pipeline, and commits a terminal status. A single bad
//! task can never take the loop down: every failure path converges on a
//! `Failed` record plus a cleared progress entry, and a task whose record
//! has vanished is dropped as a benign no-op.

use crate::job::{JobOutputs, JobSource, JobStatus, JobStore, MindMapNode};
use crate::pipeline::{chunk_size_mb, Pipeline, PipelineError};
use crate::progress::ProgressStore;
use crate::queue::{TaskMessage, TaskQueue};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long an idle worker blocks on the queue before looping.
const POLL_WAIT: Duration = Duration::from_secs(5);

/// Back-off after a queue error so a down broker does not spin the loop.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How one task attempt ended. Every variant acks the task; failed jobs
/// only run again on explicit resubmission, never by automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Outputs committed and the job marked `Completed`.
    Completed,
    /// The job was already `Completed`; redelivered task skipped.
    AlreadyCompleted,
    /// The job was marked `Failed` with an error detail.
    Failed,
    /// The job record no longer exists; the task was dropped silently.
    MissingRecord,
}

pub struct Worker {
    id: usize,
    store: JobStore,
    queue: Arc<dyn TaskQueue>,
    progress: Arc<dyn ProgressStore>,
    pipeline: Arc<dyn Pipeline>,
}

impl Worker {
    pub fn new(
        id: usize,
        store: JobStore,
        queue: Arc<dyn TaskQueue>,
        progress: Arc<dyn ProgressStore>,
        pipeline: Arc<dyn Pipeline>,
    ) -> Self {
        Self {
            id,
            store,
            queue,
            progress,
            pipeline,
        }
    }

    /// Pull and execute tasks forever.
    pub async fn run(&self) {
        info!(worker = self.id, "worker started");

        loop {
            match self.run_once(POLL_WAIT).await {
                Ok(Some(outcome)) => {
                    info!(worker = self.id, ?outcome, "task finished");
                }
                Ok(None) => {}
                Err(e) => {
                    error!(worker = self.id, error = %e, "queue error, backing off");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Wait up to `wait` for one task and execute it. Returns `Ok(None)`
    /// when the queue stayed empty. Errors are queue errors only; task
    /// failures are outcomes, not errors.
    pub async fn run_once(&self, wait: Duration) -> Result<Option<TaskOutcome>> {
        let Some(lease) = self.queue.dequeue(wait).await? else {
            return Ok(None);
        };

        let outcome = self.execute(lease.task()).await;

        // Ack regardless of outcome: the terminal record is the single
        // point of truth, and a crash before this line just means an
        // idempotent redelivery.
        if let Err(e) = lease.ack().await {
            warn!(worker = self.id, error = %e, "failed to ack task");
        }

        Ok(Some(outcome))
    }

    async fn execute(&self, task: &TaskMessage) -> TaskOutcome {
        let job_id = task.job_id.as_str();

        let job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!(job = %job_id, "job record missing, dropping task");
                return TaskOutcome::MissingRecord;
            }
            Err(e) => {
                return self
                    .fail_task(job_id, &format!("record lookup failed: {e:#}"))
                    .await;
            }
        };

        if job.status == JobStatus::Completed {
            info!(job = %job_id, "job already completed, skipping redelivered task");
            return TaskOutcome::AlreadyCompleted;
        }

        match self.store.mark_processing(job_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(job = %job_id, "job record deleted before processing");
                return TaskOutcome::MissingRecord;
            }
            Err(e) => {
                return self
                    .fail_task(job_id, &format!("could not mark job processing: {e:#}"))
                    .await;
            }
        }

        info!(worker = self.id, job = %job_id, source = ?task.source, "processing job");

        let mut ticker = ProgressTicker::new(self.progress.as_ref(), job_id);
        ticker.set(20).await;

        let outputs = match self.process(task, &mut ticker).await {
            Ok(outputs) => outputs,
            Err(e) => return self.fail_task(job_id, &e.to_string()).await,
        };

        match self.store.complete(job_id, &outputs).await {
            Ok(true) => {
                ticker.set(100).await;
                info!(worker = self.id, job = %job_id, "job completed");
                TaskOutcome::Completed
            }
            Ok(false) => {
                // Record deleted while we were processing; a late write to
                // a vanished record stays a no-op.
                info!(job = %job_id, "job record deleted mid-processing");
                if let Err(e) = self.progress.clear(job_id).await {
                    warn!(job = %job_id, error = %e, "failed to clear progress");
                }
                TaskOutcome::MissingRecord
            }
            Err(e) => {
                self.fail_task(job_id, &format!("could not commit outputs: {e:#}"))
                    .await
            }
        }
    }

    /// Run the pipeline stages in order, moving the progress bar at coarse
    /// checkpoints.
    async fn process(
        &self,
        task: &TaskMessage,
        ticker: &mut ProgressTicker<'_>,
    ) -> Result<JobOutputs, PipelineError> {
        let transcript = match task.source {
            JobSource::Audio => {
                let chunk_mb = chunk_size_mb(&task.options.transcription_client);
                self.pipeline
                    .transcribe(&task.input_ref, &task.options, chunk_mb)
                    .await?
            }
            // Text submissions carry the transcript inline; nothing to
            // transcribe.
            JobSource::Text => task.input_ref.clone(),
        };
        ticker.set(50).await;

        let minutes = self.pipeline.summarize(&transcript, &task.options).await?;
        ticker.set(70).await;

        let raw_map = self.pipeline.mindmap(&transcript, &task.options).await?;
        let mind_map = MindMapNode::normalize(&raw_map);
        ticker.set(90).await;

        Ok(JobOutputs {
            transcript,
            minutes,
            mind_map,
        })
    }

    /// Record a failure and clear the progress entry so polling clients see
    /// the failed status instead of a stale mid-run percentage.
    async fn fail_task(&self, job_id: &str, detail: &str) -> TaskOutcome {
        error!(worker = self.id, job = %job_id, detail, "task failed");

        match self.store.fail(job_id, detail).await {
            Ok(true) => {}
            Ok(false) => info!(job = %job_id, "job record gone before failure was recorded"),
            Err(e) => error!(job = %job_id, error = %e, "could not record job failure"),
        }

        if let Err(e) = self.progress.clear(job_id).await {
            warn!(job = %job_id, error = %e, "failed to clear progress");
        }

        TaskOutcome::Failed
    }
}

/// Progress writes for a single task attempt: best-effort, and clamped so
/// the bar never moves backwards within one execution.
struct ProgressTicker<'a> {
    store: &'a dyn ProgressStore,
    job_id: &'a str,
    last: u8,
}

impl<'a> ProgressTicker<'a> {
    fn new(store: &'a dyn ProgressStore, job_id: &'a str) -> Self {
        Self {
            store,
            job_id,
            last: 0,
        }
    }

    async fn set(&mut self, percent: u8) {
        if percent < self.last {
            return;
        }
        self.last = percent;
        if let Err(e) = self.store.set(self.job_id, percent).await {
            warn!(job = %self.job_id, error = %e, "failed to write progress");
        }
    }
}

/// Spawns independent workers over the same queue. Workers share nothing
/// in-process beyond the injected clients.
pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn(
        count: usize,
        store: JobStore,
        queue: Arc<dyn TaskQueue>,
        progress: Arc<dyn ProgressStore>,
        pipeline: Arc<dyn Pipeline>,
    ) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    store.clone(),
                    Arc::clone(&queue),
                    Arc::clone(&progress),
                    Arc::clone(&pipeline),
                );
                tokio::spawn(async move { worker.run().await })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgress;

    #[tokio::test]
    async fn test_ticker_suppresses_backwards_writes() {
        let store = MemoryProgress::new();
        let mut ticker = ProgressTicker::new(&store, "job-1");

        ticker.set(50).await;
        ticker.set(20).await;
        assert_eq!(store.get("job-1").await.unwrap(), Some(50));

        // Forward motion resumes once the bar catches up
        ticker.set(70).await;
        assert_eq!(store.get("job-1").await.unwrap(), Some(70));
    }

    #[tokio::test]
    async fn test_ticker_allows_repeating_the_same_percentage() {
        let store = MemoryProgress::new();
        let mut ticker = ProgressTicker::new(&store, "job-1");

        ticker.set(50).await;
        ticker.set(50).await;
        assert_eq!(store.get("job-1").await.unwrap(), Some(50));
    }
}
