use anyhow::{Context, Result};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing::info;
use transmeet_server::pipeline::Pipeline;
use transmeet_server::progress::ProgressStore;
use transmeet_server::queue::TaskQueue;
use transmeet_server::{
    create_router, AppState, Config, JetStreamQueue, JobStore, KvProgressStore, NatsPipeline,
    WorkerPool,
};

#[derive(Parser, Debug)]
#[command(name = "transmeet-server", about = "Meeting transcription job service")]
struct Args {
    /// Config file path (without extension)
    #[arg(long, default_value = "config/transmeet")]
    config: String,

    /// Override the configured worker count
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let pool = SqlitePoolOptions::new()
        .connect(&cfg.database.url)
        .await
        .context("failed to open job database")?;
    let store = JobStore::new(pool);
    store.migrate().await?;

    let client = async_nats::connect(&cfg.nats.url)
        .await
        .context("failed to connect to NATS")?;

    let queue: Arc<dyn TaskQueue> =
        Arc::new(JetStreamQueue::connect(client.clone(), &cfg.queue).await?);
    let progress: Arc<dyn ProgressStore> =
        Arc::new(KvProgressStore::connect(client.clone(), &cfg.queue.progress_bucket).await?);
    let pipeline: Arc<dyn Pipeline> =
        Arc::new(NatsPipeline::new(client, cfg.nats.pipeline_prefix.clone()));

    let worker_count = args.workers.unwrap_or(cfg.worker.count);
    let _workers = WorkerPool::spawn(
        worker_count,
        store.clone(),
        Arc::clone(&queue),
        Arc::clone(&progress),
        pipeline,
    );
    info!(count = worker_count, "worker pool started");

    let state = AppState::new(store, queue, progress);
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}
