use super::{TaskLease, TaskMessage, TaskQueue};
use crate::config::QueueConfig;
use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, stream};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::info;

const CONSUMER_NAME: &str = "workers";

/// Task queue backed by a NATS JetStream work-queue stream.
///
/// Durability and redelivery are broker-native: a message stays in the
/// stream until acked, and the consumer's `ack_wait` is the visibility
/// timeout after which an unacked delivery goes back on the wire.
pub struct JetStreamQueue {
    context: jetstream::Context,
    consumer: PullConsumer,
    subject: String,
}

impl JetStreamQueue {
    pub async fn connect(client: async_nats::Client, cfg: &QueueConfig) -> Result<Self> {
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(stream::Config {
                name: cfg.stream.clone(),
                subjects: vec![cfg.subject.clone()],
                retention: stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .context("failed to create task stream")?;

        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    ack_wait: cfg.visibility_timeout(),
                    ..Default::default()
                },
            )
            .await
            .context("failed to create worker consumer")?;

        info!(stream = %cfg.stream, subject = %cfg.subject, "task queue ready");

        Ok(Self {
            context,
            consumer,
            subject: cfg.subject.clone(),
        })
    }
}

#[async_trait]
impl TaskQueue for JetStreamQueue {
    async fn enqueue(&self, task: &TaskMessage) -> Result<()> {
        let payload = serde_json::to_vec(task).context("failed to serialize task")?;

        // The second await is the broker's ack; without it the publish is
        // not known durable and the error would be swallowed.
        self.context
            .publish(self.subject.clone(), payload.into())
            .await
            .context("failed to publish task")?
            .await
            .context("task publish was not acknowledged")?;

        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Box<dyn TaskLease>>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(1)
            .expires(wait)
            .messages()
            .await
            .context("failed to fetch from task stream")?;

        match batch.next().await {
            None => Ok(None),
            Some(message) => {
                let message = message.map_err(|e| anyhow!("task fetch failed: {e}"))?;
                let task: TaskMessage = serde_json::from_slice(&message.payload)
                    .context("failed to decode task payload")?;
                Ok(Some(Box::new(JetStreamLease { task, message })))
            }
        }
    }
}

struct JetStreamLease {
    task: TaskMessage,
    message: jetstream::Message,
}

#[async_trait]
impl TaskLease for JetStreamLease {
    fn task(&self) -> &TaskMessage {
        &self.task
    }

    async fn ack(self: Box<Self>) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| anyhow!("failed to ack task: {e}"))
    }
}
