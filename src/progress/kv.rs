use super::{progress_key, ProgressStore};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use tracing::info;

/// Progress store on a NATS JetStream key-value bucket, shared by all
/// workers and API processes. The bucket carries no durability obligation;
/// a wiped bucket just reads as "no progress".
pub struct KvProgressStore {
    store: kv::Store,
}

impl KvProgressStore {
    pub async fn connect(client: async_nats::Client, bucket: &str) -> Result<Self> {
        let context = jetstream::new(client);
        let store = context
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .context("failed to open progress bucket")?;

        info!(bucket, "progress store ready");

        Ok(Self { store })
    }
}

#[async_trait]
impl ProgressStore for KvProgressStore {
    async fn set(&self, job_id: &str, percent: u8) -> Result<()> {
        self.store
            .put(progress_key(job_id), percent.min(100).to_string().into())
            .await
            .context("failed to write progress")?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<u8>> {
        let entry = self
            .store
            .get(progress_key(job_id))
            .await
            .context("failed to read progress")?;

        Ok(entry.and_then(|bytes| {
            std::str::from_utf8(&bytes)
                .ok()
                .and_then(|text| text.trim().parse().ok())
        }))
    }

    async fn clear(&self, job_id: &str) -> Result<()> {
        self.store
            .purge(progress_key(job_id))
            .await
            .context("failed to clear progress")?;
        Ok(())
    }
}
