//! Inbound webhook ingestion pipeline for Courier.
//!
//! Turns provider webhook message units into persisted conversation
//! messages: dedup check, identity resolution (customer + open
//! conversation), content normalization, persistence, best-effort read
//! receipt, and a notification event for real-time subscribers.
//!
//! The pipeline is idempotent under webhook redelivery: the provider
//! message id is unique in the store, and a known id is discarded as a
//! no-op before any work happens.

pub mod error;
pub mod identity;
pub mod normalize;
pub mod notify;
pub mod pipeline;

pub use error::{IngestError, Result};
pub use normalize::{normalize, NormalizedContent};
pub use notify::{LoggingSink, NoOpSink, NotificationSink};
pub use pipeline::{IngestOutcome, IngestionPipeline};
