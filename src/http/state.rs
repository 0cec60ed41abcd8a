use crate::job::JobStore;
use crate::progress::ProgressStore;
use crate::queue::TaskQueue;
use std::sync::Arc;

/// Shared application state for HTTP handlers. All collaborators are
/// injected clients; there is no process-global state.
#[derive(Clone)]
pub struct AppState {
    /// Durable job records
    pub store: JobStore,

    /// Task queue the submission handler appends to
    pub queue: Arc<dyn TaskQueue>,

    /// Advisory progress entries
    pub progress: Arc<dyn ProgressStore>,
}

impl AppState {
    pub fn new(store: JobStore, queue: Arc<dyn TaskQueue>, progress: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            queue,
            progress,
        }
    }
}
