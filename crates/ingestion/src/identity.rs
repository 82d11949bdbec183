//! Identity resolution.
//!
//! Resolves or creates the customer and open conversation for an inbound
//! sender, inside the caller's transaction. Creation races with concurrent
//! webhook deliveries are absorbed by the store's unique constraints: a
//! conflict means someone else already created the row, so it is reloaded
//! and used as-is.

use database::{conversation, customer, Channel, Conversation, Customer};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::Result;

/// Resolve the (customer, open conversation) pair for a sender.
pub async fn resolve(
    conn: &mut SqliteConnection,
    channel: &Channel,
    sender_phone: &str,
    contact_name: Option<&str>,
) -> Result<(Customer, Conversation)> {
    let customer = resolve_customer(conn, channel, sender_phone, contact_name).await?;
    let conversation = resolve_conversation(conn, channel, &customer).await?;
    Ok((customer, conversation))
}

async fn resolve_customer(
    conn: &mut SqliteConnection,
    channel: &Channel,
    sender_phone: &str,
    contact_name: Option<&str>,
) -> Result<Customer> {
    if let Some(existing) = customer::find_by_phone(conn, &channel.company_id, sender_phone).await?
    {
        return Ok(existing);
    }

    let new = customer::NewCustomer {
        company_id: &channel.company_id,
        phone: sender_phone,
        name: contact_name,
        external_id: Some(sender_phone),
    };
    match customer::create_customer(conn, new).await {
        Ok(created) => {
            debug!(
                "Created customer {} for {} on company {}",
                created.id, sender_phone, channel.company_id
            );
            Ok(created)
        }
        Err(err) if err.is_conflict() => {
            // Lost the race: reload the winner.
            customer::find_by_phone(conn, &channel.company_id, sender_phone)
                .await?
                .ok_or(crate::IngestError::Database(err))
        }
        Err(err) => Err(err.into()),
    }
}

async fn resolve_conversation(
    conn: &mut SqliteConnection,
    channel: &Channel,
    customer: &Customer,
) -> Result<Conversation> {
    if let Some(existing) = conversation::find_open(conn, &channel.id, &customer.id).await? {
        return Ok(existing);
    }

    match conversation::create_conversation(conn, &channel.id, &customer.id).await {
        Ok(created) => {
            debug!(
                "Opened conversation {} for customer {}",
                created.id, customer.id
            );
            Ok(created)
        }
        Err(err) if err.is_conflict() => conversation::find_open(conn, &channel.id, &customer.id)
            .await?
            .ok_or(crate::IngestError::Database(err)),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{ChannelKind, ConversationStatus, Database};

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

    #[tokio::test]
    async fn first_contact_creates_customer_and_conversation() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let (customer, conversation) =
            resolve(&mut conn, &channel, "+15551234", Some("Ada Lovelace"))
                .await
                .unwrap();
        assert_eq!(customer.phone, "+15551234");
        assert_eq!(customer.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(conversation.status, ConversationStatus::Open);
        assert_eq!(conversation.customer_id, customer.id);
        assert_eq!(conversation.channel_id, channel.id);
    }

    #[tokio::test]
    async fn second_contact_reuses_both() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let (customer_a, conversation_a) = resolve(&mut conn, &channel, "+15551234", None)
            .await
            .unwrap();
        // Contact hint on a later event never renames an existing customer.
        let (customer_b, conversation_b) =
            resolve(&mut conn, &channel, "+15551234", Some("Renamed"))
                .await
                .unwrap();

        assert_eq!(customer_a.id, customer_b.id);
        assert_eq!(customer_b.name, None);
        assert_eq!(conversation_a.id, conversation_b.id);
    }

    #[tokio::test]
    async fn closed_conversation_gets_a_fresh_open_one() {
        let db = test_db().await;
        let channel = channel_fixture(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let (_, conversation) = resolve(&mut conn, &channel, "+15551234", None)
            .await
            .unwrap();
        drop(conn);
        database::conversation::close_conversation(db.pool(), &conversation.id)
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let (_, reopened) = resolve(&mut conn, &channel, "+15551234", None)
            .await
            .unwrap();
        assert_ne!(reopened.id, conversation.id);
        assert_eq!(reopened.status, ConversationStatus::Open);
    }
}
