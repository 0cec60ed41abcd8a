use super::{progress_key, ProgressStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local progress store for tests and embedded single-process runs.
#[derive(Clone, Default)]
pub struct MemoryProgress {
    entries: Arc<RwLock<HashMap<String, u8>>>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgress {
    async fn set(&self, job_id: &str, percent: u8) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(progress_key(job_id), percent.min(100));
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<u8>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&progress_key(job_id)).copied())
    }

    async fn clear(&self, job_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&progress_key(job_id));
        Ok(())
    }
}
