//! Retry scheduling boundary to the external task queue.

use std::time::Duration;

use async_trait::async_trait;

/// Re-enqueues a delivery task after a delay.
///
/// The durable queue itself is an external collaborator with
/// at-least-once semantics; implementations only need to make the task
/// runner call back with the message id after roughly the given delay.
/// The status guard in the delivery task makes stray or duplicate
/// re-deliveries safe.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    /// Schedule a retry for a message after `delay`.
    async fn schedule_retry(&self, message_id: &str, delay: Duration);
}

/// A scheduler that drops all retries (one-shot tools, tests).
///
/// Messages failed with retryable errors stay in `failed` until something
/// else picks them up.
#[derive(Debug, Clone, Default)]
pub struct NoopScheduler;

#[async_trait]
impl RetryScheduler for NoopScheduler {
    async fn schedule_retry(&self, message_id: &str, delay: Duration) {
        tracing::debug!(
            "Dropping retry for {} (would run in {:?})",
            message_id,
            delay
        );
    }
}
