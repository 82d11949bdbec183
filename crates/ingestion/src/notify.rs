//! Notification boundary to the real-time pub/sub collaborator.

use async_trait::async_trait;
use database::Message;

/// Receives the persisted message after a successful ingestion.
///
/// Fan-out to real-time consumers (websockets, presence, etc.) happens
/// behind this seam; implementations must not block the pipeline for long
/// and handle their own failures.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Called exactly once per newly persisted inbound message.
    async fn message_received(&self, message: &Message);
}

/// A sink that discards all notifications (tests, one-shot tools).
#[derive(Debug, Clone, Default)]
pub struct NoOpSink;

#[async_trait]
impl NotificationSink for NoOpSink {
    async fn message_received(&self, _message: &Message) {}
}

/// A sink that logs each notification.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn message_received(&self, message: &Message) {
        tracing::info!(
            "New message {} in conversation {}: {}",
            message.id,
            message.conversation_id,
            message.content
        );
    }
}
