//! Channel lookup operations.
//!
//! Channel administration (creation, credential rotation) is owned by the
//! admin surface; this core only reads channels, plus a seed helper.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Channel, ChannelKind};

/// Get a channel by ID.
pub async fn get_channel(pool: &SqlitePool, id: &str) -> Result<Channel> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, company_id, kind, phone_number_id, access_token, created_at
        FROM channels
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Channel",
        id: id.to_string(),
    })
}

/// List all channels.
pub async fn list_channels(pool: &SqlitePool) -> Result<Vec<Channel>> {
    let channels = sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, company_id, kind, phone_number_id, access_token, created_at
        FROM channels
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(channels)
}

/// Insert a channel row (seeding and tests).
pub async fn create_channel(
    pool: &SqlitePool,
    company_id: &str,
    kind: ChannelKind,
    phone_number_id: &str,
    access_token: &str,
) -> Result<Channel> {
    let id = crate::new_id();
    sqlx::query(
        r#"
        INSERT INTO channels (id, company_id, kind, phone_number_id, access_token)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(company_id)
    .bind(kind)
    .bind(phone_number_id)
    .bind(access_token)
    .execute(pool)
    .await?;

    get_channel(pool, &id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_db;

    #[tokio::test]
    async fn create_and_get_channel() {
        let db = test_db().await;
        let channel = create_channel(
            db.pool(),
            "company-1",
            ChannelKind::WhatsappCloud,
            "554433221100",
            "token-abc",
        )
        .await
        .unwrap();

        let loaded = get_channel(db.pool(), &channel.id).await.unwrap();
        assert_eq!(loaded, channel);
        assert_eq!(loaded.kind, ChannelKind::WhatsappCloud);
    }

    #[tokio::test]
    async fn get_missing_channel_is_not_found() {
        let db = test_db().await;
        let err = get_channel(db.pool(), "nope").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
