//! Ingestion error types.

use thiserror::Error;

/// Errors that abort the ingestion of one webhook event.
///
/// Malformed and duplicate events are not errors; they surface as discard
/// outcomes on the pipeline. Anything here rolls back the event's atomic
/// unit and is left to the webhook transport's redelivery policy.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Store error (resolution, persistence, transaction).
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
