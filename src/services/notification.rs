//! Completion/failure notifications for an external subscriber.
//!
//! Emission is best-effort from the gateway's perspective: the emitter logs
//! delivery problems and never propagates them to the caller, since the work
//! the event describes has already committed.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;

use crate::config::NotificationConfig;

/// Logical notification topic name, kept stable for logs and metrics.
pub const NOTIFICATION_TOPIC: &str = "notification";

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    UpdateQueryTriplestore,
    SyncFileTriplestore,
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub title: String,
    pub correlation_id: String,
}

#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    /// Publish an event. Must not fail the caller; implementations handle
    /// and log their own delivery errors.
    async fn emit(&self, event: NotificationEvent);
}

/// Emitter posting events as JSON to a configured HTTP endpoint.
pub struct HttpNotificationEmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotificationEmitter {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl NotificationEmitter for HttpNotificationEmitter {
    async fn emit(&self, event: NotificationEvent) {
        let result = self
            .client
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                counter!("notifications_emitted_total", "topic" => NOTIFICATION_TOPIC, "result" => "ok")
                    .increment(1);
            }
            Err(e) => {
                counter!("notifications_emitted_total", "topic" => NOTIFICATION_TOPIC, "result" => "error")
                    .increment(1);
                tracing::warn!(
                    endpoint = %self.endpoint,
                    correlation_id = %event.correlation_id,
                    error = %e,
                    "failed to deliver notification"
                );
            }
        }
    }
}

/// Emitter that writes events to the log, used when no endpoint is
/// configured.
pub struct LogNotificationEmitter;

#[async_trait]
impl NotificationEmitter for LogNotificationEmitter {
    async fn emit(&self, event: NotificationEvent) {
        counter!("notifications_emitted_total", "topic" => NOTIFICATION_TOPIC, "result" => "ok")
            .increment(1);
        tracing::info!(
            topic = NOTIFICATION_TOPIC,
            event_type = ?event.event_type,
            title = %event.title,
            correlation_id = %event.correlation_id,
            "notification"
        );
    }
}

pub fn build_notifier(config: &NotificationConfig) -> Arc<dyn NotificationEmitter> {
    match &config.endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "HTTP notification emitter enabled");
            Arc::new(HttpNotificationEmitter::new(endpoint.clone()))
        }
        None => Arc::new(LogNotificationEmitter),
    }
}
