//! Job records, lifecycle state machine, and the durable record store
//!
//! A `Job` is one user-submitted artifact (audio file or pasted transcript)
//! and its end-to-end processing record. Records live in SQLite via
//! `JobStore`; the queue and progress layers only ever reference a job by
//! its id.

mod mindmap;
mod record;
mod store;

pub use mindmap::MindMapNode;
pub use record::{Job, JobOptions, JobOutputs, JobSource, JobStatus, NewJob};
pub use store::JobStore;
