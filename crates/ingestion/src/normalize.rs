//! Content normalization.
//!
//! Maps provider-specific payload shapes into the canonical message
//! representation: a human-readable `content` string, a canonical kind,
//! and at most one attachment for media. Pure; malformed input degrades
//! to placeholders instead of failing.

use database::{Attachment, MessageKind};
use whatsapp_cloud::{LocationPayload, MediaPayload, WebhookMessage};

/// The canonical representation of an inbound message's content.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedContent {
    pub content: String,
    pub kind: MessageKind,
    /// Exactly one entry for media messages; `None` otherwise (never an
    /// empty list).
    pub attachments: Option<Vec<Attachment>>,
}

impl NormalizedContent {
    fn plain(content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            content: content.into(),
            kind,
            attachments: None,
        }
    }

    fn media(content: String, kind: MessageKind, media: &MediaPayload) -> Self {
        Self {
            content,
            kind,
            attachments: Some(vec![Attachment {
                kind,
                media_id: media.id.clone(),
                mime_type: media.mime_type.clone(),
                checksum: media.sha256.clone(),
                filename: media.filename.clone(),
                caption: media.caption.clone(),
            }]),
        }
    }
}

/// Normalize one webhook message unit.
pub fn normalize(message: &WebhookMessage) -> NormalizedContent {
    match message.kind.as_str() {
        "text" => {
            let body = message
                .text
                .as_ref()
                .map(|t| t.body.clone())
                .unwrap_or_default();
            NormalizedContent::plain(body, MessageKind::Text)
        }
        "image" => normalize_media(message.image.as_ref(), MessageKind::Image, "[Image]"),
        "document" => normalize_media(
            message.document.as_ref(),
            MessageKind::Document,
            "[Document]",
        ),
        "audio" => {
            // Voice notes arrive as audio with the voice flag set.
            let is_voice = message.audio.as_ref().is_some_and(|a| a.voice);
            if is_voice {
                normalize_media(message.audio.as_ref(), MessageKind::Voice, "[Voice note]")
            } else {
                normalize_media(message.audio.as_ref(), MessageKind::Audio, "[Audio]")
            }
        }
        "video" => normalize_media(message.video.as_ref(), MessageKind::Video, "[Video]"),
        "sticker" => normalize_media(message.sticker.as_ref(), MessageKind::Sticker, "[Sticker]"),
        "location" => NormalizedContent::plain(
            format_location(message.location.as_ref()),
            MessageKind::Location,
        ),
        "contacts" => NormalizedContent::plain(
            format_contacts(message.contacts.as_deref()),
            MessageKind::Contacts,
        ),
        "interactive" => NormalizedContent::plain(
            format_interactive(message),
            MessageKind::Interactive,
        ),
        _ => NormalizedContent::plain("[Unsupported message]", MessageKind::Text),
    }
}

fn normalize_media(
    media: Option<&MediaPayload>,
    kind: MessageKind,
    placeholder: &str,
) -> NormalizedContent {
    match media {
        Some(payload) => {
            let content = payload
                .caption
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(placeholder)
                .to_string();
            NormalizedContent::media(content, kind, payload)
        }
        // Kind says media but the payload carries none: placeholder only.
        None => NormalizedContent::plain(placeholder, kind),
    }
}

/// `"[Location] {lat}, {lon}[ - {name}][ ({address})]"` when coordinates
/// exist, else a bare placeholder.
fn format_location(location: Option<&LocationPayload>) -> String {
    let Some(location) = location else {
        return "[Location]".to_string();
    };
    let (Some(lat), Some(lon)) = (location.latitude, location.longitude) else {
        return "[Location]".to_string();
    };

    let mut out = format!("[Location] {}, {}", lat, lon);
    if let Some(name) = location.name.as_deref().filter(|n| !n.is_empty()) {
        out.push_str(&format!(" - {}", name));
    }
    if let Some(address) = location.address.as_deref().filter(|a| !a.is_empty()) {
        out.push_str(&format!(" ({})", address));
    }
    out
}

fn format_contacts(contacts: Option<&[serde_json::Value]>) -> String {
    let names: Vec<&str> = contacts
        .unwrap_or_default()
        .iter()
        .filter_map(|c| c["name"]["formatted_name"].as_str())
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        "[Contact]".to_string()
    } else {
        format!("[Contact] {}", names.join(", "))
    }
}

/// Surface the selected option's title; generic placeholder for
/// unrecognized interactive sub-types.
fn format_interactive(message: &WebhookMessage) -> String {
    let Some(interactive) = message.interactive.as_ref() else {
        return "[Interactive message]".to_string();
    };

    let reply = match interactive.kind.as_str() {
        "button_reply" => interactive.button_reply.as_ref(),
        "list_reply" => interactive.list_reply.as_ref(),
        _ => None,
    };

    match reply {
        Some(reply) if !reply.title.is_empty() => reply.title.clone(),
        _ => "[Interactive message]".to_string(),
    }
}
