use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::debug;

/// SQS accepts at most this many messages per receive call.
pub const MAX_RECEIVE_BATCH: i32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub body: Option<String>,
}

/// At-least-once notification queue. Messages that are not acknowledged
/// become visible again after the queue's visibility timeout.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Receives at most `limit` messages, fewer if the queue is configured
    /// for a smaller batch.
    async fn receive(&self, limit: usize) -> IngestResult<Vec<QueueMessage>>;

    async fn acknowledge(&self, receipt_handle: &str) -> IngestResult<()>;
}

#[derive(Clone, Debug)]
pub struct SqsQueue {
    inner: Client,
    queue_url: String,
    max_messages: i32,
    wait_time_seconds: i32,
}

impl SqsQueue {
    pub fn new(inner: Client, queue_url: String, max_messages: i32, wait_time_seconds: i32) -> Self {
        Self {
            inner,
            queue_url,
            max_messages: max_messages.clamp(1, MAX_RECEIVE_BATCH),
            wait_time_seconds,
        }
    }
}

#[async_trait]
impl NotificationQueue for SqsQueue {
    #[tracing::instrument(skip(self), fields(queue_url = %self.queue_url))]
    async fn receive(&self, limit: usize) -> IngestResult<Vec<QueueMessage>> {
        let max_messages = i32::try_from(limit)
            .unwrap_or(MAX_RECEIVE_BATCH)
            .clamp(1, self.max_messages);

        let output = self
            .inner
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| IngestError::Queue(e.to_string()))?;

        let messages: Vec<QueueMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| QueueMessage {
                message_id: message.message_id,
                receipt_handle: message.receipt_handle,
                body: message.body,
            })
            .collect();

        debug!(count = messages.len(), "Received messages");
        Ok(messages)
    }

    async fn acknowledge(&self, receipt_handle: &str) -> IngestResult<()> {
        self.inner
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| IngestError::Queue(e.to_string()))?;

        Ok(())
    }
}
