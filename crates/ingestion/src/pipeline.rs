//! The inbound ingestion pipeline.
//!
//! One call per webhook-delivered message unit. Identity resolution and
//! persistence run inside a single transaction; the read receipt and the
//! notification event run after commit and never affect the outcome.

use database::{message, Channel, DatabaseError, Message};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use whatsapp_cloud::{CloudClient, CloudConfig, WebhookContact, WebhookMessage};

use crate::error::Result;
use crate::identity;
use crate::normalize::normalize;
use crate::notify::NotificationSink;

/// Result of ingesting one webhook message unit.
///
/// The discard variants are expected conditions, not errors: partial
/// payloads and redelivered events must never crash the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The message was persisted and announced.
    Persisted(Message),
    /// No provider message id; discarded.
    MissingId,
    /// No sender identifier; discarded.
    MissingSender,
    /// A message with this provider id already exists; discarded.
    Duplicate,
}

/// Ingestion pipeline over one conversation store.
pub struct IngestionPipeline<S> {
    pool: SqlitePool,
    api_base: String,
    sink: S,
}

impl<S: NotificationSink> IngestionPipeline<S> {
    /// Create a pipeline against the default provider API base.
    pub fn new(pool: SqlitePool, sink: S) -> Self {
        Self::with_api_base(pool, whatsapp_cloud::config::DEFAULT_API_BASE, sink)
    }

    /// Create a pipeline with a custom provider API base (tests, proxies).
    pub fn with_api_base(pool: SqlitePool, api_base: impl Into<String>, sink: S) -> Self {
        Self {
            pool,
            api_base: api_base.into(),
            sink,
        }
    }

    /// Ingest one webhook message unit for a channel.
    ///
    /// Any returned error rolled back the whole unit; the webhook
    /// transport's redelivery will re-enter through the dedup check.
    pub async fn ingest(
        &self,
        channel: &Channel,
        event: &WebhookMessage,
        contacts: &[WebhookContact],
    ) -> Result<IngestOutcome> {
        if event.id.is_empty() {
            debug!("Discarding event without message id (type={})", event.kind);
            return Ok(IngestOutcome::MissingId);
        }
        if event.from.is_empty() {
            debug!("Discarding event {} without sender", event.id);
            return Ok(IngestOutcome::MissingSender);
        }

        let mut tx = self.pool.begin().await.map_err(DatabaseError::Sqlx)?;

        if message::exists_external(&mut tx, &event.id).await? {
            debug!("Duplicate delivery of {}, ignoring", event.id);
            return Ok(IngestOutcome::Duplicate);
        }

        let contact_name = contact_name_for(contacts, &event.from);
        let (_, conversation) =
            identity::resolve(&mut tx, channel, &event.from, contact_name).await?;

        let normalized = normalize(event);
        let payload = serde_json::to_value(event).ok();

        let inserted = message::insert_inbound(
            &mut tx,
            message::NewInboundMessage {
                conversation_id: &conversation.id,
                external_id: &event.id,
                content: &normalized.content,
                kind: normalized.kind,
                attachments: normalized.attachments.as_deref(),
                payload: payload.as_ref(),
                timestamp: event.timestamp_secs(),
            },
        )
        .await;

        let persisted = match inserted {
            Ok(persisted) => persisted,
            Err(err) if err.is_conflict() => {
                // Concurrent delivery won the insert between our dedup
                // check and now; their row stands.
                debug!("Lost insert race for {}, ignoring", event.id);
                return Ok(IngestOutcome::Duplicate);
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await.map_err(DatabaseError::Sqlx)?;

        self.acknowledge(channel, &event.id).await;
        self.sink.message_received(&persisted).await;

        Ok(IngestOutcome::Persisted(persisted))
    }

    /// Best-effort read receipt. Failures are logged and swallowed; they
    /// must never fail the ingestion or trigger a redelivery.
    async fn acknowledge(&self, channel: &Channel, message_id: &str) {
        let config = CloudConfig::with_api_base(
            self.api_base.clone(),
            channel.phone_number_id.clone(),
            channel.access_token.clone(),
        );
        match CloudClient::new(config) {
            Ok(client) => {
                if let Err(e) = client.mark_read(message_id).await {
                    warn!("Failed to mark {} as read: {}", message_id, e);
                }
            }
            Err(e) => warn!("Could not build receipt client: {}", e),
        }
    }
}

fn contact_name_for<'a>(contacts: &'a [WebhookContact], wa_id: &str) -> Option<&'a str> {
    contacts
        .iter()
        .find(|c| c.wa_id == wa_id)
        .and_then(|c| c.profile.as_ref())
        .map(|p| p.name.as_str())
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use database::{ChannelKind, Database, MessageKind, MessageStatus, SenderType};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every announced message id.
    #[derive(Debug, Clone, Default)]
    struct RecordingSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn message_received(&self, message: &Message) {
            self.seen.lock().unwrap().push(message.id.clone());
        }
    }

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn channel_fixture(db: &Database) -> Channel {
        database::channel::create_channel(
            db.pool(),
            "company-1",
            ChannelKind::WhatsappCloud,
            "554433221100",
            "token",
        )
        .await
        .unwrap()
    }

    fn text_event(id: &str, from: &str, body: &str) -> WebhookMessage {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "from": from,
            "timestamp": "1700000000",
            "type": "text",
            "text": { "body": body }
        }))
        .unwrap()
    }

    fn contacts_hint(wa_id: &str, name: &str) -> Vec<WebhookContact> {
        serde_json::from_value(serde_json::json!([
            { "wa_id": wa_id, "profile": { "name": name } }
        ]))
        .unwrap()
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    /// Pipeline whose receipt calls fail fast on a closed port.
    fn pipeline(db: &Database, sink: RecordingSink) -> IngestionPipeline<RecordingSink> {
        IngestionPipeline::with_api_base(db.pool().clone(), "http://127.0.0.1:1", sink)
    }

    #[tokio::test]
    async fn first_contact_creates_customer_conversation_and_message() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let sink = RecordingSink::default();
        let pipeline = pipeline(&db, sink.clone());

        let outcome = pipeline
            .ingest(
                &channel,
                &text_event("wamid.1", "+15551234", "Hi"),
                &contacts_hint("+15551234", "Ada Lovelace"),
            )
            .await
            .unwrap();

        let IngestOutcome::Persisted(message) = outcome else {
            panic!("expected Persisted, got {outcome:?}");
        };
        assert_eq!(message.content, "Hi");
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.sender_type, SenderType::Customer);
        assert_eq!(message.status, MessageStatus::Received);
        assert_eq!(message.external_id.as_deref(), Some("wamid.1"));
        assert!(message.payload.is_some());

        assert_eq!(count(&db, "customers").await, 1);
        assert_eq!(count(&db, "conversations").await, 1);
        assert_eq!(count(&db, "messages").await, 1);

        let conversation =
            database::conversation::get_conversation(db.pool(), &message.conversation_id)
                .await
                .unwrap();
        let customer = database::customer::get_customer(db.pool(), &conversation.customer_id)
            .await
            .unwrap();
        assert_eq!(customer.phone, "+15551234");
        assert_eq!(customer.name.as_deref(), Some("Ada Lovelace"));

        assert_eq!(*sink.seen.lock().unwrap(), vec![message.id.clone()]);
    }

    #[tokio::test]
    async fn redelivery_is_a_no_op() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let sink = RecordingSink::default();
        let pipeline = pipeline(&db, sink.clone());
        let event = text_event("wamid.1", "+15551234", "Hi");

        pipeline.ingest(&channel, &event, &[]).await.unwrap();
        let outcome = pipeline.ingest(&channel, &event, &[]).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Duplicate);
        assert_eq!(count(&db, "messages").await, 1);
        assert_eq!(count(&db, "customers").await, 1);
        assert_eq!(count(&db, "conversations").await, 1);
        // Exactly one notification despite two deliveries.
        assert_eq!(sink.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_payloads_are_discarded_not_errors() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let pipeline = pipeline(&db, RecordingSink::default());

        let no_id = text_event("", "+15551234", "Hi");
        assert_eq!(
            pipeline.ingest(&channel, &no_id, &[]).await.unwrap(),
            IngestOutcome::MissingId
        );

        let no_sender = text_event("wamid.1", "", "Hi");
        assert_eq!(
            pipeline.ingest(&channel, &no_sender, &[]).await.unwrap(),
            IngestOutcome::MissingSender
        );

        assert_eq!(count(&db, "messages").await, 0);
        assert_eq!(count(&db, "customers").await, 0);
    }

    #[tokio::test]
    async fn second_message_reuses_identity() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let pipeline = pipeline(&db, RecordingSink::default());

        pipeline
            .ingest(&channel, &text_event("wamid.1", "+15551234", "Hi"), &[])
            .await
            .unwrap();
        pipeline
            .ingest(&channel, &text_event("wamid.2", "+15551234", "Again"), &[])
            .await
            .unwrap();

        assert_eq!(count(&db, "messages").await, 2);
        assert_eq!(count(&db, "customers").await, 1);
        assert_eq!(count(&db, "conversations").await, 1);
    }

    #[tokio::test]
    async fn receipt_failure_never_fails_ingestion() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let sink = RecordingSink::default();

        // Provider rejects the read receipt with a server error.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"status": "read"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let pipeline =
            IngestionPipeline::with_api_base(db.pool().clone(), server.uri(), sink.clone());
        let outcome = pipeline
            .ingest(&channel, &text_event("wamid.1", "+15551234", "Hi"), &[])
            .await
            .unwrap();

        assert!(matches!(outcome, IngestOutcome::Persisted(_)));
        assert_eq!(sink.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn receipt_is_sent_for_persisted_messages() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "status": "read",
                "message_id": "wamid.1"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = IngestionPipeline::with_api_base(
            db.pool().clone(),
            server.uri(),
            RecordingSink::default(),
        );
        pipeline
            .ingest(&channel, &text_event("wamid.1", "+15551234", "Hi"), &[])
            .await
            .unwrap();
    }
}
