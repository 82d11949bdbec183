//! Delivery error types.

use thiserror::Error;
use whatsapp_cloud::CloudError;

/// Errors that can occur while delivering an outbound message.
///
/// The taxonomy drives the retry policy:
/// - [`DeliveryError::Config`] is fatal; the message is forced to
///   `failed_permanently` without touching the provider again.
/// - [`DeliveryError::Provider`] carries the provider's own retryable
///   classification when it is an API error; transport-level failures are
///   treated as unclassified and retried on the fixed schedule.
/// - Everything else is unclassified and retried on the fixed schedule.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Store error (lookup, status transition).
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),

    /// Wrong channel type, unsupported message kind, or a missing
    /// required field for the encoded kind.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] CloudError),

    /// Provider accepted the send but returned no message id.
    #[error("provider response missing message id")]
    MissingProviderId,
}

/// Result type for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;
