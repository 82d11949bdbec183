//! Outbound message delivery for Courier.
//!
//! Drives a `pending` message through the delivery state machine:
//! `pending -> sent` on success, `pending -> failed -> pending` across
//! scheduled retries, and `failed_permanently` for configuration errors,
//! non-retryable provider errors and exhausted retry attempts.
//!
//! Encoding into provider requests is a pure, per-kind mapping
//! ([`dispatch::OutboundPayload`]); retry scheduling sits behind the
//! [`queue::RetryScheduler`] seam so the surrounding task queue stays
//! external.

pub mod backoff;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod task;

pub use dispatch::{encode, OutboundPayload};
pub use error::{DeliveryError, Result};
pub use queue::{NoopScheduler, RetryScheduler};
pub use task::{DeliveryOutcome, DeliveryTask};
