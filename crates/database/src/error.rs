//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists (unique constraint hit)
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },
}

impl DatabaseError {
    /// Whether this error is a unique-constraint conflict.
    ///
    /// Callers resolving identities use this to fall back to reloading the
    /// row a concurrent writer already created.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
