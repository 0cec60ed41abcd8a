pub mod config;
pub mod http;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod worker;

pub use config::Config;
pub use http::{create_router, AppState};
pub use job::{Job, JobOptions, JobOutputs, JobSource, JobStatus, JobStore, MindMapNode, NewJob};
pub use pipeline::{
    check_sentinel, chunk_size_mb, NatsPipeline, Pipeline, PipelineError, PipelineResult,
    ERROR_SENTINEL,
};
pub use progress::{KvProgressStore, MemoryProgress, ProgressStore};
pub use queue::{JetStreamQueue, MemoryQueue, TaskLease, TaskMessage, TaskQueue};
pub use worker::{TaskOutcome, Worker, WorkerPool};
