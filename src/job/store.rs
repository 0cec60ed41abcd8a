use super::mindmap::MindMapNode;
use super::record::{Job, JobOptions, JobOutputs, JobSource, JobStatus, NewJob};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::warn;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id                   TEXT PRIMARY KEY,
    source               TEXT NOT NULL,
    input_ref            TEXT NOT NULL,
    status               TEXT NOT NULL DEFAULT 'queued',
    transcription_client TEXT NOT NULL,
    transcription_model  TEXT NOT NULL,
    llm_client           TEXT NOT NULL,
    llm_model            TEXT NOT NULL,
    transcript           TEXT,
    minutes              TEXT,
    mind_map             TEXT,
    error_detail         TEXT,
    created_at           TEXT NOT NULL,
    completed_at         TEXT
)
"#;

/// Row shape as stored; the mind map is a JSON column and the options are
/// flattened into columns.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    source: JobSource,
    input_ref: String,
    status: JobStatus,
    transcription_client: String,
    transcription_model: String,
    llm_client: String,
    llm_model: String,
    transcript: Option<String>,
    minutes: Option<String>,
    mind_map: Option<String>,
    error_detail: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        let mind_map = row.mind_map.as_deref().and_then(|raw| {
            serde_json::from_str::<MindMapNode>(raw)
                .map_err(|e| warn!(job = %row.id, error = %e, "stored mind map is unreadable"))
                .ok()
        });

        Job {
            id: row.id,
            source: row.source,
            input_ref: row.input_ref,
            status: row.status,
            options: JobOptions {
                transcription_client: row.transcription_client,
                transcription_model: row.transcription_model,
                llm_client: row.llm_client,
                llm_model: row.llm_model,
            },
            transcript: row.transcript,
            minutes: row.minutes,
            mind_map,
            error_detail: row.error_detail,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

/// Durable job record store backed by SQLite.
///
/// Every mutation is a single short statement; nothing here holds a
/// transaction open across a pipeline call. The guarded `UPDATE`s return
/// `false` instead of erroring when the record has been deleted out from
/// under a worker, which callers treat as a benign no-op.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .context("failed to create jobs table")?;
        Ok(())
    }

    /// Insert a fresh record in `Queued` state with a new id.
    pub async fn create(&self, new_job: NewJob) -> Result<Job> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            source: new_job.source,
            input_ref: new_job.input_ref,
            status: JobStatus::Queued,
            options: new_job.options,
            transcript: None,
            minutes: None,
            mind_map: None,
            error_detail: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO jobs (id, source, input_ref, status, transcription_client, \
             transcription_model, llm_client, llm_model, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(job.source)
        .bind(&job.input_ref)
        .bind(job.status)
        .bind(&job.options.transcription_client)
        .bind(&job.options.transcription_model)
        .bind(&job.options.llm_client)
        .bind(&job.options.llm_model)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .context("failed to insert job record")?;

        Ok(job)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load job record")?;
        Ok(row.map(Job::from))
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("failed to list job records")?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    /// Transition a record to `Processing`, clearing any failure detail from
    /// an earlier attempt. Returns `false` when the record no longer exists.
    pub async fn mark_processing(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'processing', error_detail = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to mark job processing")?;
        Ok(result.rows_affected() > 0)
    }

    /// Commit a successful run: outputs, `Completed` status, and the
    /// completion timestamp, all in one statement.
    ///
    /// Output fields are write-once: `COALESCE` keeps an already populated
    /// value, so a redelivered task can never clobber stored outputs with
    /// fresh (or empty) ones. Returns `false` when the record is gone.
    pub async fn complete(&self, id: &str, outputs: &JobOutputs) -> Result<bool> {
        let mind_map_json = serde_json::to_string(&outputs.mind_map)
            .context("failed to serialize mind map")?;

        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', completed_at = ?, \
             transcript = COALESCE(transcript, ?), \
             minutes = COALESCE(minutes, ?), \
             mind_map = COALESCE(mind_map, ?), \
             error_detail = NULL \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(&outputs.transcript)
        .bind(&outputs.minutes)
        .bind(mind_map_json)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to commit job outputs")?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition a record to `Failed` with a human-readable detail.
    /// Returns `false` when the record is gone.
    pub async fn fail(&self, id: &str, error_detail: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET status = 'failed', error_detail = ? WHERE id = ?")
            .bind(error_detail)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to mark job failed")?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a record entirely. Returns `false` when it was already gone.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete job record")?;
        Ok(result.rows_affected() > 0)
    }
}
