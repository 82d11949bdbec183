//! SQLite persistence layer for Courier.
//!
//! This crate provides async database operations for channels, customers,
//! conversations and messages using SQLx with SQLite. The schema carries the
//! uniqueness constraints that back Courier's idempotency invariants: one
//! customer per (company, phone), one open conversation per (channel,
//! customer), one message per provider id.
//!
//! # Example
//!
//! ```no_run
//! use database::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:courier.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let channels = database::channel::list_channels(db.pool()).await?;
//!     println!("{} channel(s)", channels.len());
//!
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod conversation;
pub mod customer;
pub mod error;
pub mod message;
pub mod models;

pub use error::{DatabaseError, Result};
pub use models::{
    Attachment, Channel, ChannelKind, Conversation, ConversationStatus, Customer, Message,
    MessageKind, MessageStatus, SenderType,
};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough to handle concurrent pipeline workers.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/courier.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Generate a fresh entity id.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::Database;

    /// Fresh in-memory database with migrations applied.
    ///
    /// Pool size 1: every pooled connection would otherwise get its own
    /// private `:memory:` database.
    pub async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }
}
