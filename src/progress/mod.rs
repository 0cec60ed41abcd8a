//! Advisory progress reporting
//!
//! Progress is a best-effort 0-100 signal for polling clients, stored
//! separately from the authoritative job status. Nothing may block or fail
//! because an entry is missing: absence reads as `None` and callers default
//! it to 0 (or infer 100 from a completed status). Losing the whole store
//! on restart only degrades the progress bar.

mod kv;
mod memory;

pub use kv::KvProgressStore;
pub use memory::MemoryProgress;

use anyhow::Result;
use async_trait::async_trait;

/// Key layout for a job's progress entry. NATS KV keys cannot contain `:`,
/// so the segments are dot-separated.
pub fn progress_key(job_id: &str) -> String {
    format!("job.{job_id}.progress")
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn set(&self, job_id: &str, percent: u8) -> Result<()>;

    async fn get(&self, job_id: &str) -> Result<Option<u8>>;

    /// Remove the entry. Clearing an absent entry is fine; this must be
    /// safe to call concurrently with deletion of the job itself.
    async fn clear(&self, job_id: &str) -> Result<()>;
}
