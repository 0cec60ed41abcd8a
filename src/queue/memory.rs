use super::{TaskLease, TaskMessage, TaskQueue};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

/// How long a blocked `dequeue` sleeps between checks for expired leases.
const RECLAIM_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Inner {
    ready: VecDeque<TaskMessage>,
    in_flight: HashMap<u64, InFlight>,
    next_lease_id: u64,
}

struct InFlight {
    task: TaskMessage,
    deadline: Instant,
}

/// In-process task queue with the same delivery contract as the JetStream
/// one: single consumer per task, and unacked leases return to the ready
/// list after a visibility timeout. Used by the test suite and by embedded
/// single-process runs.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            notify: Arc::new(Notify::new()),
            visibility_timeout,
        }
    }

    /// Tasks currently waiting for a worker (excludes in-flight leases).
    pub async fn ready_len(&self) -> usize {
        self.inner.lock().await.ready.len()
    }
}

/// Move leases whose visibility timeout lapsed back to the ready list.
fn reclaim_expired(inner: &mut Inner, now: Instant) {
    let expired: Vec<u64> = inner
        .in_flight
        .iter()
        .filter(|(_, entry)| entry.deadline <= now)
        .map(|(lease_id, _)| *lease_id)
        .collect();

    for lease_id in expired {
        if let Some(entry) = inner.in_flight.remove(&lease_id) {
            inner.ready.push_back(entry.task);
        }
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: &TaskMessage) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.ready.push_back(task.clone());
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Box<dyn TaskLease>>> {
        let give_up = Instant::now() + wait;

        loop {
            {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                reclaim_expired(&mut inner, now);

                if let Some(task) = inner.ready.pop_front() {
                    let lease_id = inner.next_lease_id;
                    inner.next_lease_id += 1;
                    inner.in_flight.insert(
                        lease_id,
                        InFlight {
                            task: task.clone(),
                            deadline: now + self.visibility_timeout,
                        },
                    );
                    return Ok(Some(Box::new(MemoryLease {
                        lease_id,
                        task,
                        inner: Arc::clone(&self.inner),
                    })));
                }
            }

            let remaining = match give_up.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => return Ok(None),
            };

            // Sleep in short slices so an expiring lease is noticed even
            // when no producer wakes us.
            let _ = timeout(remaining.min(RECLAIM_INTERVAL), self.notify.notified()).await;
        }
    }
}

struct MemoryLease {
    lease_id: u64,
    task: TaskMessage,
    inner: Arc<Mutex<Inner>>,
}

#[async_trait]
impl TaskLease for MemoryLease {
    fn task(&self) -> &TaskMessage {
        &self.task
    }

    async fn ack(self: Box<Self>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(&self.lease_id);
        Ok(())
    }
}
