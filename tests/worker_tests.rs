// Integration tests for the worker execution loop
//
// These drive a real worker over the in-memory queue, an in-memory SQLite
// record store, and a scripted pipeline fake, and verify the state machine:
// terminal transitions, progress behavior, benign no-ops on deleted
// records, and idempotent redelivery.

mod common;

use anyhow::Result;
use common::{audio_job, memory_store, text_job, RecordingProgress, ScriptedPipeline};
use std::sync::Arc;
use std::time::Duration;
use transmeet_server::pipeline::Pipeline;
use transmeet_server::progress::ProgressStore;
use transmeet_server::queue::{MemoryQueue, TaskMessage, TaskQueue};
use transmeet_server::{JobStatus, TaskOutcome, Worker};

const VISIBILITY: Duration = Duration::from_secs(60);
const WAIT: Duration = Duration::from_millis(200);

struct Harness {
    store: transmeet_server::JobStore,
    queue: Arc<MemoryQueue>,
    progress: Arc<RecordingProgress>,
    worker: Worker,
}

async fn harness(pipeline: ScriptedPipeline) -> Result<Harness> {
    let store = memory_store().await?;
    let queue = Arc::new(MemoryQueue::new(VISIBILITY));
    let progress = Arc::new(RecordingProgress::new());
    let worker = Worker::new(
        0,
        store.clone(),
        queue.clone() as Arc<dyn TaskQueue>,
        progress.clone() as Arc<dyn ProgressStore>,
        Arc::new(pipeline) as Arc<dyn Pipeline>,
    );
    Ok(Harness {
        store,
        queue,
        progress,
        worker,
    })
}

#[tokio::test]
async fn test_audio_job_completes_with_monotonic_progress() -> Result<()> {
    let h = harness(ScriptedPipeline::happy()).await?;

    let job = h.store.create(audio_job("uploads/standup.wav")).await?;
    h.queue.enqueue(&TaskMessage::for_job(&job)).await?;

    let outcome = h.worker.run_once(WAIT).await?;
    assert_eq!(outcome, Some(TaskOutcome::Completed));

    // Exactly one terminal state, with all outputs populated
    let stored = h.store.get(&job.id).await?.expect("record exists");
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.transcript.as_deref().is_some_and(|t| !t.is_empty()));
    assert!(stored.minutes.as_deref().is_some_and(|m| !m.is_empty()));
    assert!(stored.mind_map.is_some());
    assert!(stored.completed_at.is_some());
    assert!(stored.error_detail.is_none());

    // Progress checkpoints: subset of {20, 50, 70, 90, 100}, strictly
    // increasing, ending at 100
    let writes = h.progress.writes();
    assert_eq!(writes, vec![20, 50, 70, 90, 100]);
    assert!(writes.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(h.progress.get(&job.id).await?, Some(100));

    Ok(())
}

#[tokio::test]
async fn test_error_sentinel_payload_marks_job_failed() -> Result<()> {
    let pipeline = ScriptedPipeline::happy()
        .with_transcript_reply(Ok("Error: audio could not be decoded".to_string()));
    let h = harness(pipeline).await?;

    let job = h.store.create(audio_job("uploads/broken.wav")).await?;
    h.queue.enqueue(&TaskMessage::for_job(&job)).await?;

    let outcome = h.worker.run_once(WAIT).await?;
    assert_eq!(outcome, Some(TaskOutcome::Failed));

    let stored = h.store.get(&job.id).await?.expect("record exists");
    assert_eq!(stored.status, JobStatus::Failed);
    let detail = stored.error_detail.expect("failure detail recorded");
    assert!(detail.contains("Error: audio could not be decoded"));
    assert!(stored.transcript.is_none());

    // Progress entry is cleared so polling clients do not see a stale
    // mid-run percentage
    assert_eq!(h.progress.get(&job.id).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_transport_error_marks_job_failed() -> Result<()> {
    let pipeline = ScriptedPipeline::happy()
        .with_transcript_reply(Err("connection reset by provider".to_string()));
    let h = harness(pipeline).await?;

    let job = h.store.create(audio_job("uploads/standup.wav")).await?;
    h.queue.enqueue(&TaskMessage::for_job(&job)).await?;

    let outcome = h.worker.run_once(WAIT).await?;
    assert_eq!(outcome, Some(TaskOutcome::Failed));

    let stored = h.store.get(&job.id).await?.expect("record exists");
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored
        .error_detail
        .expect("failure detail recorded")
        .contains("connection reset by provider"));
    assert_eq!(h.progress.get(&job.id).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_failure_midway_still_clears_progress() -> Result<()> {
    // Transcription succeeds, minutes generation fails: earlier progress
    // writes must not survive the failure
    let pipeline =
        ScriptedPipeline::happy().with_minutes_reply(Err("model overloaded".to_string()));
    let h = harness(pipeline).await?;

    let job = h.store.create(audio_job("uploads/standup.wav")).await?;
    h.queue.enqueue(&TaskMessage::for_job(&job)).await?;

    assert_eq!(h.worker.run_once(WAIT).await?, Some(TaskOutcome::Failed));
    assert!(h.progress.writes().contains(&50));
    assert_eq!(h.progress.get(&job.id).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_missing_record_is_a_benign_no_op() -> Result<()> {
    let h = harness(ScriptedPipeline::happy()).await?;

    let job = h.store.create(audio_job("uploads/standup.wav")).await?;
    h.queue.enqueue(&TaskMessage::for_job(&job)).await?;

    // Deleted between enqueue and dequeue
    assert!(h.store.delete(&job.id).await?);

    let outcome = h.worker.run_once(WAIT).await?;
    assert_eq!(outcome, Some(TaskOutcome::MissingRecord));

    // Nothing was recreated and the task is gone for good
    assert!(h.store.get(&job.id).await?.is_none());
    assert_eq!(h.queue.ready_len().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_redelivery_after_completion_preserves_outputs() -> Result<()> {
    let h = harness(ScriptedPipeline::happy()).await?;

    let job = h.store.create(audio_job("uploads/standup.wav")).await?;
    let task = TaskMessage::for_job(&job);

    h.queue.enqueue(&task).await?;
    assert_eq!(h.worker.run_once(WAIT).await?, Some(TaskOutcome::Completed));
    let first = h.store.get(&job.id).await?.expect("record exists");

    // Same task delivered again (at-least-once)
    h.queue.enqueue(&task).await?;
    assert_eq!(
        h.worker.run_once(WAIT).await?,
        Some(TaskOutcome::AlreadyCompleted)
    );

    let second = h.store.get(&job.id).await?.expect("record exists");
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.transcript, first.transcript);
    assert_eq!(second.minutes, first.minutes);
    assert_eq!(second.completed_at, first.completed_at);

    Ok(())
}

#[tokio::test]
async fn test_text_job_skips_transcription() -> Result<()> {
    let h = harness(ScriptedPipeline::happy()).await?;

    let job = h
        .store
        .create(text_job("Alice: let's review the roadmap."))
        .await?;
    h.queue.enqueue(&TaskMessage::for_job(&job)).await?;

    assert_eq!(h.worker.run_once(WAIT).await?, Some(TaskOutcome::Completed));

    let stored = h.store.get(&job.id).await?.expect("record exists");
    assert_eq!(
        stored.transcript.as_deref(),
        Some("Alice: let's review the roadmap.")
    );
    assert!(stored.minutes.is_some());

    Ok(())
}

#[tokio::test]
async fn test_failed_job_completes_on_explicit_resubmission() -> Result<()> {
    let store = memory_store().await?;
    let queue = Arc::new(MemoryQueue::new(VISIBILITY));

    let job = store.create(audio_job("uploads/standup.wav")).await?;
    let task = TaskMessage::for_job(&job);

    // First attempt fails at the provider
    let failing = harness_worker(
        &store,
        &queue,
        ScriptedPipeline::happy().with_transcript_reply(Err("provider outage".to_string())),
    );
    queue.enqueue(&task).await?;
    assert_eq!(failing.run_once(WAIT).await?, Some(TaskOutcome::Failed));
    assert_eq!(
        store.get(&job.id).await?.expect("record exists").status,
        JobStatus::Failed
    );

    // Resubmission enqueues a fresh task for the same job id
    let healthy = harness_worker(&store, &queue, ScriptedPipeline::happy());
    queue.enqueue(&task).await?;
    assert_eq!(healthy.run_once(WAIT).await?, Some(TaskOutcome::Completed));

    let stored = store.get(&job.id).await?.expect("record exists");
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.error_detail.is_none());

    Ok(())
}

#[tokio::test]
async fn test_crashed_worker_task_is_redelivered_and_completed() -> Result<()> {
    let store = memory_store().await?;
    let queue = Arc::new(MemoryQueue::new(Duration::from_millis(50)));

    let job = store.create(audio_job("uploads/standup.wav")).await?;
    queue.enqueue(&TaskMessage::for_job(&job)).await?;

    // Simulate a worker that died mid-task: lease taken, never acked
    let lease = queue.dequeue(WAIT).await?.expect("task available");
    drop(lease);
    tokio::time::sleep(Duration::from_millis(80)).await;

    let worker = harness_worker(&store, &queue, ScriptedPipeline::happy());
    assert_eq!(
        worker.run_once(Duration::from_secs(1)).await?,
        Some(TaskOutcome::Completed)
    );
    assert_eq!(
        store.get(&job.id).await?.expect("record exists").status,
        JobStatus::Completed
    );

    Ok(())
}

fn harness_worker(
    store: &transmeet_server::JobStore,
    queue: &Arc<MemoryQueue>,
    pipeline: ScriptedPipeline,
) -> Worker {
    Worker::new(
        0,
        store.clone(),
        queue.clone() as Arc<dyn TaskQueue>,
        Arc::new(RecordingProgress::new()) as Arc<dyn ProgressStore>,
        Arc::new(pipeline) as Arc<dyn Pipeline>,
    )
}
