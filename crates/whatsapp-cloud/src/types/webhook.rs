//! Webhook payload types for inbound events.
//!
//! The HTTP layer owns signature verification and routing; it hands each
//! [`WebhookMessage`] (with the batch's [`WebhookContact`] hints) to the
//! ingestion pipeline. Provider payloads are partial for many event types,
//! so almost every field is defaulted rather than required.

use serde::{Deserialize, Serialize};

/// Top-level webhook envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// One WABA entry in the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// A change notification inside an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    pub value: ChangeValue,
}

/// The value of a `messages` field change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    /// Contact profiles for the senders in this batch.
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

/// Receiving-number metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: String,
    #[serde(default)]
    pub phone_number_id: String,
}

/// A contact profile hint delivered alongside messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

/// Profile data inside a contact hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: String,
}

/// One inbound message unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Provider message id (wamid). Empty on some partial payloads.
    #[serde(default)]
    pub id: String,

    /// Sender identifier (wa_id / phone digits).
    #[serde(default)]
    pub from: String,

    /// Event timestamp, epoch seconds as a decimal string.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Provider message kind ("text", "image", "interactive", ...).
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub text: Option<TextPayload>,

    #[serde(default)]
    pub image: Option<MediaPayload>,

    #[serde(default)]
    pub document: Option<MediaPayload>,

    #[serde(default)]
    pub audio: Option<MediaPayload>,

    #[serde(default)]
    pub video: Option<MediaPayload>,

    #[serde(default)]
    pub sticker: Option<MediaPayload>,

    #[serde(default)]
    pub location: Option<LocationPayload>,

    /// Shared contact cards (name objects kept loose; only the formatted
    /// name is consumed).
    #[serde(default)]
    pub contacts: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub interactive: Option<InteractivePayload>,
}

impl WebhookMessage {
    /// Event timestamp parsed as epoch seconds, if present and well-formed.
    pub fn timestamp_secs(&self) -> Option<i64> {
        self.timestamp.as_deref()?.parse().ok()
    }
}

/// Body of a text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub body: String,
}

/// Common shape of all media kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Provider media id, used to download the blob later.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Set on audio payloads recorded in-app (voice notes).
    #[serde(default)]
    pub voice: bool,
}

/// A shared location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPayload {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// An interactive reply (button press or list selection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractivePayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub button_reply: Option<InteractiveReply>,
    #[serde(default)]
    pub list_reply: Option<InteractiveReply>,
}

/// The selected option of an interactive reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveReply {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_message_event() {
        let raw = serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA_ID",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "15550001111",
                            "phone_number_id": "554433221100"
                        },
                        "contacts": [{
                            "wa_id": "15551234",
                            "profile": { "name": "Ada Lovelace" }
                        }],
                        "messages": [{
                            "id": "wamid.1",
                            "from": "15551234",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": { "body": "Hi" }
                        }]
                    }
                }]
            }]
        });

        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let change = &payload.entry[0].changes[0];
        assert_eq!(change.field, "messages");

        let message = &change.value.messages[0];
        assert_eq!(message.id, "wamid.1");
        assert_eq!(message.kind, "text");
        assert_eq!(message.text.as_ref().unwrap().body, "Hi");
        assert_eq!(message.timestamp_secs(), Some(1_700_000_000));

        let contact = &change.value.contacts[0];
        assert_eq!(contact.profile.as_ref().unwrap().name, "Ada Lovelace");
    }

    #[test]
    fn partial_payload_defaults_instead_of_failing() {
        // Status-update style payloads have no text/media at all.
        let message: WebhookMessage = serde_json::from_value(serde_json::json!({
            "type": "unsupported"
        }))
        .unwrap();
        assert!(message.id.is_empty());
        assert!(message.from.is_empty());
        assert_eq!(message.timestamp_secs(), None);
    }

    #[test]
    fn bad_timestamp_is_none() {
        let message: WebhookMessage = serde_json::from_value(serde_json::json!({
            "id": "wamid.2",
            "from": "15551234",
            "timestamp": "not-a-number",
            "type": "text",
            "text": { "body": "x" }
        }))
        .unwrap();
        assert_eq!(message.timestamp_secs(), None);
    }
}
