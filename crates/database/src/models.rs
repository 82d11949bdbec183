//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Transport kind of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ChannelKind {
    /// WhatsApp Business Cloud API.
    WhatsappCloud,
    /// Some other transport this core does not dispatch to.
    Other,
}

/// Status of a conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SenderType {
    Customer,
    Agent,
    System,
}

/// Canonical message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Document,
    Audio,
    Video,
    Voice,
    Sticker,
    Location,
    Contacts,
    Interactive,
    Template,
}

impl MessageKind {
    /// Whether this kind carries a media attachment when sent outbound.
    pub fn is_media(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Document | Self::Audio | Self::Video | Self::Voice | Self::Sticker
        )
    }
}

/// Delivery status of a message.
///
/// Inbound messages are created directly in `Received`. Outbound messages
/// start in `Pending` and are driven by the delivery task; `Sent` and
/// `FailedPermanently` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageStatus {
    Received,
    Pending,
    Sent,
    Failed,
    FailedPermanently,
}

impl MessageStatus {
    /// Whether no further transitions are allowed from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Received | Self::Sent | Self::FailedPermanently)
    }
}

/// A messaging channel owned by a company.
///
/// Channel administration lives outside this core; rows are only read to
/// scope conversations and to supply provider credentials at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: String,
    pub company_id: String,
    pub kind: ChannelKind,
    /// Provider phone number id this channel sends from.
    pub phone_number_id: String,
    /// Provider access token for this channel.
    pub access_token: String,
    pub created_at: String,
}

/// A tenant-scoped customer identity, keyed by (company, phone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: String,
    pub company_id: String,
    /// Channel identity; immutable once created.
    pub phone: String,
    /// Display name from the provider contact profile, if any.
    pub name: Option<String>,
    /// Provider account id (wa_id), if known.
    pub external_id: Option<String>,
    pub created_at: String,
}

/// An ongoing thread between one customer and one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: String,
    pub channel_id: String,
    pub customer_id: String,
    pub status: ConversationStatus,
    pub created_at: String,
}

/// One attachment entry stored in a message's `attachments` JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Provider media id.
    pub media_id: String,
    pub mime_type: Option<String>,
    /// Provider-computed sha256, when given.
    pub checksum: Option<String>,
    pub filename: Option<String>,
    pub caption: Option<String>,
}

/// The append-only record of one inbound or outbound unit of communication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// Provider-assigned message id; null for outbound until acknowledged.
    pub external_id: Option<String>,
    pub sender_type: SenderType,
    pub content: String,
    pub kind: MessageKind,
    /// JSON list of [`Attachment`]; null rather than an empty list.
    pub attachments: Option<String>,
    /// Raw provider envelope, retained for audit/replay.
    pub payload: Option<String>,
    pub status: MessageStatus,
    /// JSON object: provider response, error context, delivery timestamps.
    pub metadata: String,
    /// Delivery attempts made so far (outbound only).
    pub attempts: i64,
    pub created_at: String,
    pub sent_at: Option<String>,
}

impl Message {
    /// Parse the attachments column.
    ///
    /// Returns `None` for both a null column and unparseable content (the
    /// raw text is still in the row for inspection).
    pub fn attachments(&self) -> Option<Vec<Attachment>> {
        let raw = self.attachments.as_deref()?;
        serde_json::from_str(raw).ok()
    }

    /// Parse the metadata column, falling back to an empty object.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}
