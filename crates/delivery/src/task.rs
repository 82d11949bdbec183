//! The delivery task state machine.
//!
//! One [`DeliveryTask::deliver`] call is one attempt. Classified provider
//! errors decide their own fate (provider-suggested delay, terminal on
//! non-retryable); unclassified errors are recorded and re-raised so
//! [`DeliveryTask::handle`] can apply the fixed backoff schedule up to the
//! attempt cap. Every state transition is guarded in the store, so
//! duplicate or late task executions degrade to no-ops.

use std::time::Duration;

use database::{channel, conversation, customer, message, ChannelKind, Message, MessageStatus};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use whatsapp_cloud::{CloudClient, CloudConfig, CloudError};

use crate::backoff;
use crate::dispatch;
use crate::error::{DeliveryError, Result};
use crate::queue::RetryScheduler;

/// Result of handling one delivery task invocation.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The message was not pending; nothing was done.
    Skipped { reason: String },
    /// The provider accepted the message.
    Delivered { provider_id: String },
    /// A retry was scheduled.
    Rescheduled { delay: Duration, attempt: i64 },
    /// Terminal failure; no further attempts.
    Abandoned { reason: String },
    /// The task itself could not run (e.g. store unavailable).
    Error(DeliveryError),
}

/// Delivery task runner over one conversation store.
pub struct DeliveryTask<Q> {
    pool: SqlitePool,
    api_base: String,
    scheduler: Q,
    max_attempts: i64,
}

impl<Q: RetryScheduler> DeliveryTask<Q> {
    /// Create a task runner against the default provider API base.
    pub fn new(pool: SqlitePool, scheduler: Q) -> Self {
        Self::with_api_base(pool, whatsapp_cloud::config::DEFAULT_API_BASE, scheduler)
    }

    /// Create a task runner with a custom provider API base.
    pub fn with_api_base(pool: SqlitePool, api_base: impl Into<String>, scheduler: Q) -> Self {
        Self {
            pool,
            api_base: api_base.into(),
            scheduler,
            max_attempts: backoff::MAX_ATTEMPTS,
        }
    }

    /// Override the attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Handle one task invocation, applying the unclassified retry policy.
    pub async fn handle(&self, message_id: &str) -> DeliveryOutcome {
        match self.deliver(message_id).await {
            Ok(outcome) => outcome,
            Err(err) => self.retry_unclassified(message_id, err).await,
        }
    }

    /// Re-entry point for a scheduled retry: reset `failed -> pending`,
    /// then run a fresh attempt.
    pub async fn redispatch(&self, message_id: &str) -> DeliveryOutcome {
        match message::reset_for_retry(&self.pool, message_id).await {
            Ok(true) => self.handle(message_id).await,
            Ok(false) => {
                // Cancelled or otherwise resolved while waiting.
                debug!("Retry for {} is stale, skipping", message_id);
                DeliveryOutcome::Skipped {
                    reason: "message no longer awaiting retry".to_string(),
                }
            }
            Err(err) => DeliveryOutcome::Error(err.into()),
        }
    }

    /// One delivery attempt.
    ///
    /// Returns `Err` only for unclassified failures, which the caller
    /// retries on the fixed schedule; every classified path resolves to an
    /// outcome here.
    pub async fn deliver(&self, message_id: &str) -> Result<DeliveryOutcome> {
        let message = message::get_message(&self.pool, message_id).await?;

        if message.status != MessageStatus::Pending {
            debug!(
                "Message {} is {:?}, not pending; skipping",
                message.id, message.status
            );
            return Ok(DeliveryOutcome::Skipped {
                reason: format!("status is {:?}", message.status),
            });
        }

        let conversation = conversation::get_conversation(&self.pool, &message.conversation_id).await?;
        let channel = channel::get_channel(&self.pool, &conversation.channel_id).await?;
        let customer = customer::get_customer(&self.pool, &conversation.customer_id).await?;

        if channel.kind != ChannelKind::WhatsappCloud {
            return self
                .abandon(
                    &message,
                    format!("channel {} is not a whatsapp_cloud channel", channel.id),
                )
                .await;
        }

        let payload = match dispatch::encode(&message) {
            Ok(payload) => payload,
            Err(DeliveryError::Config(reason)) => return self.abandon(&message, reason).await,
            Err(err) => return Err(err),
        };

        let config = CloudConfig::with_api_base(
            self.api_base.clone(),
            channel.phone_number_id.clone(),
            channel.access_token.clone(),
        );
        let client = CloudClient::new(config)?;
        let request = payload.into_request(&customer.phone);

        match client.send(&request).await {
            Ok(response) => {
                let provider_id = response
                    .message_id()
                    .ok_or(DeliveryError::MissingProviderId)?
                    .to_string();

                let mut metadata = message.metadata();
                if let Some(map) = metadata.as_object_mut() {
                    map.insert(
                        "api_response".to_string(),
                        serde_json::to_value(&response).unwrap_or_default(),
                    );
                    map.insert(
                        "provider_sent_at".to_string(),
                        json!(chrono::Utc::now().to_rfc3339()),
                    );
                }

                if message::mark_sent(&self.pool, &message.id, &provider_id, &metadata).await? {
                    info!("Delivered {} as {}", message.id, provider_id);
                    Ok(DeliveryOutcome::Delivered { provider_id })
                } else {
                    // Raced with a concurrent resolution; theirs stands.
                    warn!("Message {} resolved concurrently after send", message.id);
                    Ok(DeliveryOutcome::Skipped {
                        reason: "resolved concurrently".to_string(),
                    })
                }
            }
            Err(CloudError::Api {
                code,
                kind,
                message: error_message,
                retryable,
                retry_after,
            }) => {
                let attempt = message.attempts + 1;
                let mut metadata = message.metadata();
                record_error(
                    &mut metadata,
                    attempt,
                    Some(code),
                    Some(&kind),
                    &error_message,
                );
                message::mark_failed(&self.pool, &message.id, &metadata).await?;

                if retryable && attempt < self.max_attempts {
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| backoff::retry_delay(attempt));
                    warn!(
                        "Attempt {} for {} failed with provider error {}; retrying in {:?}",
                        attempt, message.id, code, delay
                    );
                    self.scheduler.schedule_retry(&message.id, delay).await;
                    Ok(DeliveryOutcome::Rescheduled { delay, attempt })
                } else {
                    let reason = format!(
                        "provider error {} ({}): {}",
                        code,
                        if retryable { "retries exhausted" } else { "not retryable" },
                        error_message
                    );
                    error!("Abandoning {}: {}", message.id, reason);
                    message::mark_failed_permanently(&self.pool, &message.id, &metadata).await?;
                    Ok(DeliveryOutcome::Abandoned { reason })
                }
            }
            Err(err) => {
                // Unclassified (transport, malformed response): record the
                // attempt, then re-raise for the generic retry policy.
                let attempt = message.attempts + 1;
                let mut metadata = message.metadata();
                record_error(&mut metadata, attempt, None, None, &err.to_string());
                message::mark_failed(&self.pool, &message.id, &metadata).await?;
                Err(err.into())
            }
        }
    }

    /// Force a terminal configuration failure.
    async fn abandon(&self, message: &Message, reason: String) -> Result<DeliveryOutcome> {
        error!("Abandoning {}: {}", message.id, reason);
        let mut metadata = message.metadata();
        record_error(&mut metadata, message.attempts, None, None, &reason);
        message::mark_failed_permanently(&self.pool, &message.id, &metadata).await?;
        Ok(DeliveryOutcome::Abandoned { reason })
    }

    /// Apply the fixed backoff schedule after an unclassified failure.
    async fn retry_unclassified(&self, message_id: &str, err: DeliveryError) -> DeliveryOutcome {
        let message = match message::get_message(&self.pool, message_id).await {
            Ok(message) => message,
            Err(load_err) => {
                error!(
                    "Could not load {} after delivery error ({}): {}",
                    message_id, err, load_err
                );
                return DeliveryOutcome::Error(load_err.into());
            }
        };

        let mut attempts = message.attempts;
        if message.status == MessageStatus::Pending {
            // The attempt died before it could be recorded.
            let mut metadata = message.metadata();
            record_error(&mut metadata, attempts + 1, None, None, &err.to_string());
            match message::mark_failed(&self.pool, &message.id, &metadata).await {
                Ok(true) => attempts += 1,
                Ok(false) => {
                    return DeliveryOutcome::Skipped {
                        reason: "resolved concurrently".to_string(),
                    }
                }
                Err(mark_err) => return DeliveryOutcome::Error(mark_err.into()),
            }
        }

        if attempts >= self.max_attempts {
            let reason = format!("retries exhausted after {} attempts: {}", attempts, err);
            error!("Abandoning {}: {}", message_id, reason);
            let metadata = match message::get_message(&self.pool, message_id).await {
                Ok(m) => m.metadata(),
                Err(_) => message.metadata(),
            };
            if let Err(mark_err) =
                message::mark_failed_permanently(&self.pool, message_id, &metadata).await
            {
                return DeliveryOutcome::Error(mark_err.into());
            }
            DeliveryOutcome::Abandoned { reason }
        } else {
            let delay = backoff::retry_delay(attempts);
            warn!(
                "Attempt {} for {} failed ({}); retrying in {:?}",
                attempts, message_id, err, delay
            );
            self.scheduler.schedule_retry(message_id, delay).await;
            DeliveryOutcome::Rescheduled {
                delay,
                attempt: attempts,
            }
        }
    }
}

/// Merge error context for one failed attempt into message metadata.
fn record_error(
    metadata: &mut serde_json::Value,
    attempt: i64,
    code: Option<i64>,
    kind: Option<&str>,
    message: &str,
) {
    let Some(map) = metadata.as_object_mut() else {
        return;
    };
    map.insert("last_error".to_string(), json!(message));
    map.insert("last_error_code".to_string(), json!(code));
    map.insert("last_error_type".to_string(), json!(kind));
    map.insert("last_attempt".to_string(), json!(attempt));

    let history = map
        .entry("failed_attempts".to_string())
        .or_insert_with(|| json!([]));
    if let Some(entries) = history.as_array_mut() {
        entries.push(json!({
            "attempt": attempt,
            "code": code,
            "type": kind,
            "message": message,
            "at": chrono::Utc::now().to_rfc3339(),
        }));
    }
}
