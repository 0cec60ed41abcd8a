use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub nats: NatsConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. "sqlite://transmeet.db?mode=rwc"
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// Subject prefix for pipeline request/reply: `<prefix>.transcribe`,
    /// `<prefix>.minutes`, `<prefix>.mindmap`.
    pub pipeline_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueConfig {
    /// JetStream stream name for the task queue.
    pub stream: String,
    /// Subject tasks are published on.
    pub subject: String,
    /// Seconds before an unacked task becomes deliverable again.
    pub visibility_timeout_secs: u64,
    /// KV bucket for advisory progress entries.
    pub progress_bucket: String,
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker tasks pulling from the queue in this process.
    pub count: usize,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
