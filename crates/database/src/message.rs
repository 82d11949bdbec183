//! Message persistence and status transitions.
//!
//! Messages are append-only; only the delivery task mutates them, and every
//! status UPDATE carries a WHERE guard on the current status so transitions
//! stay monotonic under duplicate task execution. The partial unique index
//! on `external_id` is the dedup backstop for webhook redelivery.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Attachment, Message, MessageKind, MessageStatus, SenderType};

const SELECT_MESSAGE: &str = r#"
    SELECT id, conversation_id, external_id, sender_type, content, kind,
           attachments, payload, status, metadata, attempts, created_at, sent_at
    FROM messages
"#;

/// Fields for persisting an inbound (customer) message.
#[derive(Debug, Clone)]
pub struct NewInboundMessage<'a> {
    pub conversation_id: &'a str,
    /// Provider message id (wamid).
    pub external_id: &'a str,
    pub content: &'a str,
    pub kind: MessageKind,
    pub attachments: Option<&'a [Attachment]>,
    /// Raw provider envelope, retained for audit/replay.
    pub payload: Option<&'a serde_json::Value>,
    /// Provider event timestamp, epoch seconds. Falls back to now.
    pub timestamp: Option<i64>,
}

/// Fields for enqueuing an outbound message in `pending` status.
#[derive(Debug, Clone)]
pub struct NewOutboundMessage<'a> {
    pub conversation_id: &'a str,
    pub sender_type: SenderType,
    pub content: &'a str,
    pub kind: MessageKind,
    pub attachments: Option<&'a [Attachment]>,
    /// Send options (template name, preview flag, ...).
    pub metadata: Option<&'a serde_json::Value>,
}

/// Whether a message with this provider id already exists.
pub async fn exists_external(conn: &mut SqliteConnection, external_id: &str) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages WHERE external_id = ?
        "#,
    )
    .bind(external_id)
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

/// Persist an inbound message in the terminal `received` status.
///
/// A duplicate `external_id` maps to [`DatabaseError::AlreadyExists`]; under
/// concurrent redelivery the caller treats that as "already ingested".
pub async fn insert_inbound(
    conn: &mut SqliteConnection,
    new: NewInboundMessage<'_>,
) -> Result<Message> {
    let id = crate::new_id();
    let attachments = encode_attachments(new.attachments)?;
    let payload = new.payload.map(serde_json::Value::to_string);

    sqlx::query(
        r#"
        INSERT INTO messages
            (id, conversation_id, external_id, sender_type, content, kind,
             attachments, payload, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?,
                COALESCE(datetime(?, 'unixepoch'), datetime('now')))
        "#,
    )
    .bind(&id)
    .bind(new.conversation_id)
    .bind(new.external_id)
    .bind(SenderType::Customer)
    .bind(new.content)
    .bind(new.kind)
    .bind(attachments)
    .bind(payload)
    .bind(MessageStatus::Received)
    .bind(new.timestamp)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Message",
                    key: new.external_id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    fetch_on(conn, &id).await
}

/// Enqueue an outbound message in `pending` status.
pub async fn insert_outbound(pool: &SqlitePool, new: NewOutboundMessage<'_>) -> Result<Message> {
    let id = crate::new_id();
    let attachments = encode_attachments(new.attachments)?;
    let metadata = new
        .metadata
        .map_or_else(|| "{}".to_string(), serde_json::Value::to_string);

    sqlx::query(
        r#"
        INSERT INTO messages
            (id, conversation_id, sender_type, content, kind, attachments,
             status, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.conversation_id)
    .bind(new.sender_type)
    .bind(new.content)
    .bind(new.kind)
    .bind(attachments)
    .bind(MessageStatus::Pending)
    .bind(metadata)
    .execute(pool)
    .await?;

    get_message(pool, &id).await
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: &str) -> Result<Message> {
    sqlx::query_as::<_, Message>(&format!("{SELECT_MESSAGE} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Message",
            id: id.to_string(),
        })
}

/// Oldest pending outbound messages, for the worker poll loop.
pub async fn find_due_pending(pool: &SqlitePool, limit: i64) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(&format!(
        "{SELECT_MESSAGE} WHERE status = ? ORDER BY created_at LIMIT ?"
    ))
    .bind(MessageStatus::Pending)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// `pending -> sent`: record the provider id and acknowledge timestamp.
///
/// Returns false if the message was not pending (duplicate task execution).
pub async fn mark_sent(
    pool: &SqlitePool,
    id: &str,
    external_id: &str,
    metadata: &serde_json::Value,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?, external_id = ?, sent_at = datetime('now'), metadata = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(MessageStatus::Sent)
    .bind(external_id)
    .bind(metadata.to_string())
    .bind(id)
    .bind(MessageStatus::Pending)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// `pending -> failed`: record error context and count the attempt.
pub async fn mark_failed(pool: &SqlitePool, id: &str, metadata: &serde_json::Value) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?, attempts = attempts + 1, metadata = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(MessageStatus::Failed)
    .bind(metadata.to_string())
    .bind(id)
    .bind(MessageStatus::Pending)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// `pending | failed -> failed_permanently`: terminal failure.
pub async fn mark_failed_permanently(
    pool: &SqlitePool,
    id: &str,
    metadata: &serde_json::Value,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?, metadata = ?
        WHERE id = ? AND status IN (?, ?)
        "#,
    )
    .bind(MessageStatus::FailedPermanently)
    .bind(metadata.to_string())
    .bind(id)
    .bind(MessageStatus::Pending)
    .bind(MessageStatus::Failed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// `failed -> pending`: scheduled retry re-entry, before redispatch.
pub async fn reset_for_retry(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(MessageStatus::Pending)
    .bind(id)
    .bind(MessageStatus::Failed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Cancel a non-terminal outbound message out-of-band.
///
/// The status guard in the delivery task makes any late-arriving attempt for
/// a cancelled message a no-op.
pub async fn cancel(pool: &SqlitePool, id: &str) -> Result<bool> {
    let message = get_message(pool, id).await?;
    if message.status.is_terminal() {
        return Ok(false);
    }

    let mut metadata = message.metadata();
    if let Some(map) = metadata.as_object_mut() {
        map.insert("cancelled".to_string(), serde_json::Value::Bool(true));
    }
    mark_failed_permanently(pool, id, &metadata).await
}

async fn fetch_on(conn: &mut SqliteConnection, id: &str) -> Result<Message> {
    sqlx::query_as::<_, Message>(&format!("{SELECT_MESSAGE} WHERE id = ?"))
        .bind(id)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::Sqlx)
}

fn encode_attachments(attachments: Option<&[Attachment]>) -> Result<Option<String>> {
    match attachments {
        // An empty-but-present list is never stored.
        Some([]) | None => Ok(None),
        Some(list) => Ok(Some(
            serde_json::to_string(list).map_err(|e| DatabaseError::Sqlx(sqlx::Error::Encode(e.into())))?,
        )),
    }
}
