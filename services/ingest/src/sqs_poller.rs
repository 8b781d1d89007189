use crate::events::Envelope;
use crate::handler::{RecordHandler, handle_event};
use crate::queue::{NotificationQueue, QueueMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// What happened to a message after one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Handled (or unprocessable) and deleted from the queue.
    Acknowledged,
    /// Left on the queue; it reappears after the visibility timeout.
    Redeliver,
}

/// Pulls notifications from a queue and feeds them to one worker stage with
/// bounded concurrency. A message is deleted only after its handler
/// succeeds.
#[derive(Clone)]
pub struct SqsPoller {
    queue: Arc<dyn NotificationQueue>,
    handler: Arc<dyn RecordHandler>,
    concurrency: usize,
    poll_error_backoff: Duration,
}

impl SqsPoller {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        handler: Arc<dyn RecordHandler>,
        concurrency: usize,
        poll_error_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            handler,
            concurrency: concurrency.max(1),
            poll_error_backoff,
        }
    }

    /// Polls until `shutdown` resolves, then waits for in-flight messages.
    pub async fn run<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            worker = self.handler.name(),
            concurrency = self.concurrency,
            "Starting queue polling"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }

            // Never receive more messages than can start right away.
            let capacity = semaphore.available_permits();
            if capacity == 0 {
                tokio::select! {
                    _ = &mut shutdown => break,
                    Some(joined) = tasks.join_next() => log_join(joined),
                }
                continue;
            }

            tokio::select! {
                _ = &mut shutdown => break,
                received = self.queue.receive(capacity) => match received {
                    Ok(messages) => {
                        for message in messages {
                            let permit = semaphore.clone().acquire_owned().await?;
                            let queue = self.queue.clone();
                            let handler = self.handler.clone();
                            tasks.spawn(async move {
                                let _permit = permit;
                                process_message(queue.as_ref(), handler.as_ref(), message).await
                            });
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to poll queue");
                        sleep(self.poll_error_backoff).await;
                    }
                },
            }
        }

        info!(in_flight = tasks.len(), "Shutting down, draining in-flight messages");
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        Ok(())
    }
}

fn log_join(joined: Result<MessageOutcome, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Message task panicked");
    }
}

/// Handles one delivery of a message and acknowledges it unless it must be
/// retried.
#[tracing::instrument(skip_all, fields(worker = handler.name(), message_id = message.message_id.as_deref().unwrap_or("")))]
pub async fn process_message(
    queue: &dyn NotificationQueue,
    handler: &dyn RecordHandler,
    message: QueueMessage,
) -> MessageOutcome {
    let body = message.body.as_deref().unwrap_or_default();

    match Envelope::decode(body) {
        Envelope::Direct(event) | Envelope::Wrapped(event) => {
            if let Err(e) = handle_event(handler, &event).await {
                warn!(error = %e, "Leaving message for redelivery");
                return MessageOutcome::Redeliver;
            }
        }
        Envelope::Unrecognized(reason) => {
            warn!(reason = %reason, "Unknown message format, discarding");
        }
    }

    let Some(receipt_handle) = message.receipt_handle.as_deref() else {
        warn!("No receipt handle found for message");
        return MessageOutcome::Redeliver;
    };

    match queue.acknowledge(receipt_handle).await {
        Ok(()) => MessageOutcome::Acknowledged,
        Err(e) => {
            error!(error = %e, "Failed to delete message");
            MessageOutcome::Redeliver
        }
    }
}
