//! Conversation thread operations.
//!
//! At most one `open` conversation exists per (channel, customer); a partial
//! unique index enforces this under concurrent creation.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Conversation, ConversationStatus};

/// Find the open conversation for a (channel, customer) pair, if any.
pub async fn find_open(
    conn: &mut SqliteConnection,
    channel_id: &str,
    customer_id: &str,
) -> Result<Option<Conversation>> {
    let conversation = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, channel_id, customer_id, status, created_at
        FROM conversations
        WHERE channel_id = ? AND customer_id = ? AND status = ?
        "#,
    )
    .bind(channel_id)
    .bind(customer_id)
    .bind(ConversationStatus::Open)
    .fetch_optional(conn)
    .await?;

    Ok(conversation)
}

/// Create a new open conversation.
pub async fn create_conversation(
    conn: &mut SqliteConnection,
    channel_id: &str,
    customer_id: &str,
) -> Result<Conversation> {
    let id = crate::new_id();
    sqlx::query(
        r#"
        INSERT INTO conversations (id, channel_id, customer_id, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(channel_id)
    .bind(customer_id)
    .bind(ConversationStatus::Open)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Conversation",
                    key: format!("{}/{}", channel_id, customer_id),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, channel_id, customer_id, status, created_at
        FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(&id)
    .fetch_one(conn)
    .await
    .map_err(DatabaseError::Sqlx)
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &SqlitePool, id: &str) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, channel_id, customer_id, status, created_at
        FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Conversation",
        id: id.to_string(),
    })
}

/// Close a conversation. Returns false if it was not open.
pub async fn close_conversation(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET status = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(ConversationStatus::Closed)
    .bind(id)
    .bind(ConversationStatus::Open)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::create_channel;
    use crate::customer::{create_customer, NewCustomer};
    use crate::models::ChannelKind;
    use crate::test_util::test_db;

    async fn fixtures(db: &crate::Database) -> (String, String) {
        let channel = create_channel(
            db.pool(),
            "company-1",
            ChannelKind::WhatsappCloud,
            "554433221100",
            "token",
        )
        .await
        .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let customer = create_customer(
            &mut conn,
            NewCustomer {
                company_id: "company-1",
                phone: "+15551234",
                name: None,
                external_id: None,
            },
        )
        .await
        .unwrap();
        (channel.id, customer.id)
    }

    #[tokio::test]
    async fn second_open_conversation_is_conflict() {
        let db = test_db().await;
        let (channel_id, customer_id) = fixtures(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        create_conversation(&mut conn, &channel_id, &customer_id)
            .await
            .unwrap();
        let err = create_conversation(&mut conn, &channel_id, &customer_id)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn closing_allows_a_fresh_open_conversation() {
        let db = test_db().await;
        let (channel_id, customer_id) = fixtures(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let first = create_conversation(&mut conn, &channel_id, &customer_id)
            .await
            .unwrap();
        drop(conn);
        assert!(close_conversation(db.pool(), &first.id).await.unwrap());
        // Already closed: no-op.
        assert!(!close_conversation(db.pool(), &first.id).await.unwrap());

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(find_open(&mut conn, &channel_id, &customer_id)
            .await
            .unwrap()
            .is_none());
        let second = create_conversation(&mut conn, &channel_id, &customer_id)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.status, ConversationStatus::Open);
    }
}
