//! WhatsApp Business Cloud API client library.
//!
//! This crate provides a thin Rust client for the Cloud API messaging
//! endpoints. It supports:
//!
//! - Sending text, template and media messages
//! - Marking inbound messages as read
//! - Typed webhook payloads for inbound events
//! - A classified error taxonomy (retryable vs. fatal, with provider
//!   suggested delays)
//!
//! # Example
//!
//! ```no_run
//! use whatsapp_cloud::{CloudClient, CloudConfig, SendRequest};
//!
//! # async fn example() -> Result<(), whatsapp_cloud::CloudError> {
//! let config = CloudConfig::new("554433221100", "ACCESS_TOKEN");
//! let client = CloudClient::new(config)?;
//!
//! let response = client
//!     .send(&SendRequest::text("+15551234", "Hello!", true))
//!     .await?;
//! println!("Provider id: {:?}", response.message_id());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::CloudClient;
pub use config::CloudConfig;
pub use error::CloudError;
pub use types::*;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
