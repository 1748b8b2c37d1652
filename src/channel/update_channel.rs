//! The `sparql-update` work queue.
//!
//! A scheduler/worker pair over a bounded mpsc channel. The HTTP boundary
//! enqueues update bodies and returns immediately; workers dequeue, execute
//! through the transactional executor's write path, and own the
//! redelivery/backoff/dead-letter policy. No cross-update ordering is
//! promised to callers.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use gateway_triple_store::{classify, Operation, StoreError, TransactionalExecutor};
use metrics::{counter, histogram};
use tokio::sync::{mpsc, Mutex, Semaphore};
use uuid::Uuid;

use super::{FailureStore, QUEUE_SPARQL_UPDATE, QUEUE_SPARQL_UPDATE_FAILURE};
use crate::config::UpdateChannelConfig;
use crate::error::GatewayError;
use crate::services::notification::{EventType, NotificationEmitter, NotificationEvent};

/// An update body in flight, owned by the channel from enqueue until ack or
/// dead-letter.
#[derive(Clone, Debug)]
pub struct UpdateMessage {
    pub body: String,
    pub redelivery_count: u32,
    pub correlation_id: Uuid,
}

impl UpdateMessage {
    fn new(body: String) -> Self {
        Self {
            body,
            redelivery_count: 0,
            correlation_id: Uuid::new_v4(),
        }
    }
}

/// Handle for enqueueing updates. Cloned across the application.
#[derive(Clone)]
pub struct UpdateScheduler {
    tx: mpsc::Sender<UpdateMessage>,
}

impl UpdateScheduler {
    /// Create the channel pair: the scheduler for producers and the receiver
    /// for the worker pool.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UpdateMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue an update body. Waits only for channel admission, never for
    /// execution; the returned correlation id identifies the accepted work.
    pub async fn enqueue(&self, body: String) -> Result<Uuid, GatewayError> {
        let message = UpdateMessage::new(body);
        let correlation_id = message.correlation_id;
        self.tx
            .send(message)
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        counter!("update_channel_enqueued_total", "queue" => QUEUE_SPARQL_UPDATE).increment(1);
        Ok(correlation_id)
    }
}

/// Worker pool draining the update channel.
pub struct UpdateWorker {
    rx: Arc<Mutex<mpsc::Receiver<UpdateMessage>>>,
    redelivery_tx: mpsc::WeakSender<UpdateMessage>,
    executor: Arc<TransactionalExecutor>,
    failure_store: FailureStore,
    notifier: Arc<dyn NotificationEmitter>,
    config: UpdateChannelConfig,
    semaphore: Arc<Semaphore>,
}

impl UpdateWorker {
    pub fn new(
        scheduler: &UpdateScheduler,
        rx: mpsc::Receiver<UpdateMessage>,
        executor: Arc<TransactionalExecutor>,
        failure_store: FailureStore,
        notifier: Arc<dyn NotificationEmitter>,
        config: UpdateChannelConfig,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            rx: Arc::new(Mutex::new(rx)),
            // Redelivery must not keep the channel open during shutdown; a
            // weak sender lets the channel close once all producers are gone.
            redelivery_tx: scheduler.tx.downgrade(),
            executor,
            failure_store,
            notifier,
            config,
            semaphore: Arc::new(Semaphore::new(concurrency)),
        }
    }

    /// Run until the channel closes, then drain in-flight work.
    pub async fn run(&self) {
        let concurrency = self.config.concurrency.max(1);
        let mut pending_tasks = FuturesUnordered::new();

        loop {
            let mut locked_rx = self.rx.lock().await;

            // Messages are taken off the channel only while a permit is
            // free, so excess work queues in the channel (admission bound)
            // instead of piling up here.
            tokio::select! {
                _ = pending_tasks.select_next_some(), if !pending_tasks.is_empty() => {
                    // Continue the loop when a task completes.
                }
                message = locked_rx.recv(), if pending_tasks.len() < concurrency => {
                    match message {
                        Some(message) => {
                            drop(locked_rx);
                            let permit = Arc::clone(&self.semaphore)
                                .acquire_owned()
                                .await
                                .expect("update worker semaphore closed");
                            pending_tasks.push(self.execute(message, permit));
                        }
                        None => {
                            tracing::info!("update channel closed, shutting down worker");
                            break;
                        }
                    }
                }
            }
        }

        if !pending_tasks.is_empty() {
            tracing::info!(
                pending_count = pending_tasks.len(),
                "waiting for in-flight updates to complete"
            );
            while pending_tasks.next().await.is_some() {}
        }
    }

    async fn execute(&self, message: UpdateMessage, _permit: tokio::sync::OwnedSemaphorePermit) {
        let started = Instant::now();
        let result = self.apply(&message).await;
        histogram!("update_channel_execution_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                counter!("update_channel_executed_total", "result" => "ok").increment(1);
                tracing::debug!(correlation_id = %message.correlation_id, "update executed");
                self.notify_executed(&message);
            }
            Err(error) => {
                counter!("update_channel_executed_total", "result" => "error").increment(1);
                tracing::warn!(
                    correlation_id = %message.correlation_id,
                    redelivery_count = message.redelivery_count,
                    max_redeliveries = self.config.max_redeliveries,
                    error = %error,
                    "update execution failed"
                );
                if message.redelivery_count < self.config.max_redeliveries {
                    self.redeliver(message);
                } else {
                    self.dead_letter(message).await;
                }
            }
        }
    }

    async fn apply(&self, message: &UpdateMessage) -> Result<(), StoreError> {
        let op = match classify(&message.body)? {
            Operation::Update(op) => op,
            Operation::Read(_) => {
                return Err(StoreError::Parse {
                    reason: "read operation on the update channel".to_string(),
                });
            }
        };
        self.executor.write(&op).await
    }

    fn redeliver(&self, mut message: UpdateMessage) {
        message.redelivery_count += 1;
        let delay = self.config.redelivery_backoff(message.redelivery_count);
        let tx = self.redelivery_tx.clone();
        let failure_store = self.failure_store.clone();

        counter!("update_channel_redelivered_total").increment(1);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Some(tx) = tx.upgrade() else {
                // Shutting down: quarantine instead of dropping the update.
                persist_or_log(&failure_store, &message).await;
                return;
            };
            if let Err(e) = tx.send(message).await {
                persist_or_log(&failure_store, &e.0).await;
            }
        });
    }

    async fn dead_letter(&self, message: UpdateMessage) {
        counter!("update_channel_dead_lettered_total", "queue" => QUEUE_SPARQL_UPDATE_FAILURE)
            .increment(1);
        tracing::error!(
            correlation_id = %message.correlation_id,
            redeliveries = message.redelivery_count,
            "update exhausted redelivery, moving to failure store"
        );
        persist_or_log(&self.failure_store, &message).await;
    }

    fn notify_executed(&self, message: &UpdateMessage) {
        let notifier = Arc::clone(&self.notifier);
        let event = NotificationEvent {
            event_type: EventType::UpdateQueryTriplestore,
            title: "update executed".to_string(),
            correlation_id: message.correlation_id.to_string(),
        };
        // Best-effort: a notification failure never rolls back the committed
        // update, so it runs detached from the worker.
        tokio::spawn(async move { notifier.emit(event).await });
    }
}

async fn persist_or_log(failure_store: &FailureStore, message: &UpdateMessage) {
    if let Err(e) = failure_store.persist(&message.body).await {
        // Last resort: the body goes to the log rather than vanishing.
        tracing::error!(
            correlation_id = %message.correlation_id,
            error = %e,
            body = %message.body,
            "failed to persist dead-lettered update"
        );
    }
}
