//! Courier outbound delivery worker.
//!
//! Polls the store for pending outbound messages and drives each through
//! the delivery state machine; scheduled retries re-enter through an
//! in-process timer channel. Inbound ingestion is invoked by the webhook
//! transport, not by this worker.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use database::Database;
use delivery::{DeliveryOutcome, DeliveryTask, RetryScheduler};

#[derive(Debug, Parser)]
#[command(name = "courier-worker")]
#[command(about = "Deliver pending outbound messages via the WhatsApp Cloud API")]
struct Args {
    /// Database URL. Falls back to DATABASE_URL, then a local file.
    #[arg(long)]
    database_url: Option<String>,

    /// Provider API base URL. Falls back to WHATSAPP_API_BASE, then the
    /// public Graph API.
    #[arg(long)]
    api_base: Option<String>,

    /// Poll interval for pending messages, in seconds
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Maximum messages picked up per poll
    #[arg(long, default_value_t = 10)]
    batch_size: i64,

    /// Maximum delivery attempts per message
    #[arg(long, default_value_t = 5)]
    max_attempts: i64,
}

/// Scheduler backed by an in-process timer and an mpsc channel.
///
/// Retries survive only as long as the process; messages left in `failed`
/// by a crash are re-entered by operators or a queue with real durability.
#[derive(Clone)]
struct TokioScheduler {
    retry_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl RetryScheduler for TokioScheduler {
    async fn schedule_retry(&self, message_id: &str, delay: Duration) {
        let retry_tx = self.retry_tx.clone();
        let message_id = message_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if retry_tx.send(message_id).is_err() {
                warn!("Retry channel closed; dropping retry");
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let database_url = args
        .database_url
        .or_else(|| env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:courier.db?mode=rwc".to_string());
    let api_base = args
        .api_base
        .or_else(|| env::var("WHATSAPP_API_BASE").ok())
        .unwrap_or_else(|| whatsapp_cloud::config::DEFAULT_API_BASE.to_string());

    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let (retry_tx, mut retry_rx) = mpsc::unbounded_channel();
    let task = DeliveryTask::with_api_base(
        db.pool().clone(),
        api_base,
        TokioScheduler { retry_tx },
    )
    .with_max_attempts(args.max_attempts);

    info!(
        "Delivery worker started (poll every {}s, batch {}, max {} attempts)",
        args.poll_interval, args.batch_size, args.max_attempts
    );

    let mut poll = tokio::time::interval(Duration::from_secs(args.poll_interval.max(1)));

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping delivery worker");
                return Ok(());
            }

            Some(message_id) = retry_rx.recv() => {
                log_outcome(&message_id, task.redispatch(&message_id).await);
            }

            _ = poll.tick() => {
                let due = match database::message::find_due_pending(db.pool(), args.batch_size).await {
                    Ok(due) => due,
                    Err(e) => {
                        error!("Failed to poll pending messages: {}", e);
                        continue;
                    }
                };
                for message in due {
                    log_outcome(&message.id, task.handle(&message.id).await);
                }
            }
        }
    }
}

/// The task itself logs transitions; this only surfaces loop-level context.
fn log_outcome(message_id: &str, outcome: DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Delivered { provider_id } => {
            debug!("Delivered {} as {}", message_id, provider_id);
        }
        DeliveryOutcome::Rescheduled { delay, attempt } => {
            debug!(
                "Attempt {} for {} failed; retry in {:?}",
                attempt, message_id, delay
            );
        }
        DeliveryOutcome::Skipped { reason } => {
            debug!("Skipped {}: {}", message_id, reason);
        }
        DeliveryOutcome::Abandoned { reason } => {
            warn!("Abandoned {}: {}", message_id, reason);
        }
        DeliveryOutcome::Error(err) => {
            error!("Delivery task error for {}: {}", message_id, err);
        }
    }
}
