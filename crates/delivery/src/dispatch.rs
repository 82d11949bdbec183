//! Outbound dispatch encoding.
//!
//! Pure mapping from a stored message to a provider request, one variant
//! per sendable kind. A missing required field is a configuration error
//! caught here, before any provider call.

use database::{Message, MessageKind};
use whatsapp_cloud::{MediaType, SendRequest, TemplateParameter};

use crate::error::{DeliveryError, Result};

/// Locale used when a template message does not specify one.
const DEFAULT_TEMPLATE_LOCALE: &str = "en_US";

/// A fully validated, provider-ready outbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    Text {
        body: String,
        preview_url: bool,
    },
    Template {
        name: String,
        language: String,
        parameters: Vec<String>,
    },
    Media {
        media_type: MediaType,
        media_id: String,
        caption: Option<String>,
        filename: Option<String>,
    },
}

impl OutboundPayload {
    /// Build the wire request for a recipient.
    pub fn into_request(self, to: &str) -> SendRequest {
        match self {
            Self::Text { body, preview_url } => SendRequest::text(to, body, preview_url),
            Self::Template {
                name,
                language,
                parameters,
            } => SendRequest::template(
                to,
                name,
                language,
                parameters
                    .into_iter()
                    .map(TemplateParameter::text_param)
                    .collect(),
            ),
            Self::Media {
                media_type,
                media_id,
                caption,
                filename,
            } => SendRequest::media(to, media_type, media_id, caption, filename),
        }
    }
}

/// Encode a message by kind.
///
/// Kinds that cannot be sent outbound (location, contacts, interactive)
/// are rejected as unsupported.
pub fn encode(message: &Message) -> Result<OutboundPayload> {
    match message.kind {
        MessageKind::Text => encode_text(message),
        MessageKind::Template => encode_template(message),
        kind if kind.is_media() => encode_media(message),
        kind => Err(DeliveryError::Config(format!(
            "unsupported outbound message kind: {:?}",
            kind
        ))),
    }
}

fn encode_text(message: &Message) -> Result<OutboundPayload> {
    let metadata = message.metadata();
    Ok(OutboundPayload::Text {
        body: message.content.clone(),
        preview_url: metadata["preview_url"].as_bool().unwrap_or(true),
    })
}

fn encode_template(message: &Message) -> Result<OutboundPayload> {
    let metadata = message.metadata();

    let name = metadata["template_name"]
        .as_str()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            DeliveryError::Config(format!(
                "template message {} has no template_name",
                message.id
            ))
        })?
        .to_string();

    let language = metadata["language_code"]
        .as_str()
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_TEMPLATE_LOCALE)
        .to_string();

    let parameters = metadata["template_parameters"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(OutboundPayload::Template {
        name,
        language,
        parameters,
    })
}

fn encode_media(message: &Message) -> Result<OutboundPayload> {
    let attachments = message.attachments().unwrap_or_default();
    let attachment = attachments.first().ok_or_else(|| {
        DeliveryError::Config(format!(
            "media message {} has no attachments",
            message.id
        ))
    })?;

    if attachment.media_id.is_empty() {
        return Err(DeliveryError::Config(format!(
            "media message {} attachment has no media id",
            message.id
        )));
    }

    let caption = attachment
        .caption
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| Some(message.content.clone()).filter(|c| !c.is_empty()));

    Ok(OutboundPayload::Media {
        media_type: media_type_for(message.kind),
        media_id: attachment.media_id.clone(),
        caption,
        filename: attachment.filename.clone(),
    })
}

/// Outbound wire kind for a media message. Voice notes send as audio.
fn media_type_for(kind: MessageKind) -> MediaType {
    match kind {
        MessageKind::Document => MediaType::Document,
        MessageKind::Audio | MessageKind::Voice => MediaType::Audio,
        MessageKind::Video => MediaType::Video,
        MessageKind::Sticker => MediaType::Sticker,
        _ => MediaType::Image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{Attachment, MessageStatus, SenderType};

    fn outbound(kind: MessageKind, content: &str, metadata: serde_json::Value) -> Message {
        Message {
            id: "msg-1".to_string(),
            conversation_id: "conv-1".to_string(),
            external_id: None,
            sender_type: SenderType::Agent,
            content: content.to_string(),
            kind,
            attachments: None,
            payload: None,
            status: MessageStatus::Pending,
            metadata: metadata.to_string(),
            attempts: 0,
            created_at: "2026-01-01 00:00:00".to_string(),
            sent_at: None,
        }
    }

    fn with_attachment(mut message: Message, attachment: Attachment) -> Message {
        message.attachments = Some(serde_json::to_string(&[attachment]).unwrap());
        message
    }

    fn image_attachment(media_id: &str) -> Attachment {
        Attachment {
            kind: MessageKind::Image,
            media_id: media_id.to_string(),
            mime_type: Some("image/jpeg".to_string()),
            checksum: None,
            filename: None,
            caption: None,
        }
    }

    #[test]
    fn text_defaults_preview_url_on() {
        let payload = encode(&outbound(MessageKind::Text, "hi", serde_json::json!({}))).unwrap();
        assert_eq!(
            payload,
            OutboundPayload::Text {
                body: "hi".to_string(),
                preview_url: true
            }
        );
    }

    #[test]
    fn text_respects_preview_url_flag() {
        let payload = encode(&outbound(
            MessageKind::Text,
            "hi",
            serde_json::json!({"preview_url": false}),
        ))
        .unwrap();
        let OutboundPayload::Text { preview_url, .. } = payload else {
            panic!("expected text payload");
        };
        assert!(!preview_url);
    }

    #[test]
    fn template_requires_name() {
        let err = encode(&outbound(MessageKind::Template, "", serde_json::json!({}))).unwrap_err();
        assert!(matches!(err, DeliveryError::Config(_)));
    }

    #[test]
    fn template_defaults_locale_and_parameters() {
        let payload = encode(&outbound(
            MessageKind::Template,
            "",
            serde_json::json!({"template_name": "order_update"}),
        ))
        .unwrap();
        assert_eq!(
            payload,
            OutboundPayload::Template {
                name: "order_update".to_string(),
                language: "en_US".to_string(),
                parameters: vec![],
            }
        );
    }

    #[test]
    fn template_carries_parameters() {
        let payload = encode(&outbound(
            MessageKind::Template,
            "",
            serde_json::json!({
                "template_name": "order_update",
                "language_code": "de_DE",
                "template_parameters": ["Ada", "tomorrow"]
            }),
        ))
        .unwrap();
        let OutboundPayload::Template {
            language,
            parameters,
            ..
        } = payload
        else {
            panic!("expected template payload");
        };
        assert_eq!(language, "de_DE");
        assert_eq!(parameters, vec!["Ada".to_string(), "tomorrow".to_string()]);
    }

    #[test]
    fn media_requires_an_attachment() {
        for kind in [
            MessageKind::Image,
            MessageKind::Document,
            MessageKind::Audio,
            MessageKind::Video,
            MessageKind::Voice,
            MessageKind::Sticker,
        ] {
            let err = encode(&outbound(kind, "", serde_json::json!({}))).unwrap_err();
            assert!(matches!(err, DeliveryError::Config(_)), "kind {kind:?}");
        }
    }

    #[test]
    fn media_requires_a_media_id() {
        let message = with_attachment(
            outbound(MessageKind::Image, "", serde_json::json!({})),
            image_attachment(""),
        );
        let err = encode(&message).unwrap_err();
        assert!(matches!(err, DeliveryError::Config(_)));
    }

    #[test]
    fn media_caption_falls_back_to_content() {
        let message = with_attachment(
            outbound(MessageKind::Image, "look at this", serde_json::json!({})),
            image_attachment("media-1"),
        );
        let OutboundPayload::Media {
            media_type,
            media_id,
            caption,
            ..
        } = encode(&message).unwrap()
        else {
            panic!("expected media payload");
        };
        assert_eq!(media_type, MediaType::Image);
        assert_eq!(media_id, "media-1");
        assert_eq!(caption.as_deref(), Some("look at this"));
    }

    #[test]
    fn attachment_caption_wins_over_content() {
        let mut attachment = image_attachment("media-1");
        attachment.caption = Some("from the attachment".to_string());
        let message = with_attachment(
            outbound(MessageKind::Image, "from the content", serde_json::json!({})),
            attachment,
        );
        let OutboundPayload::Media { caption, .. } = encode(&message).unwrap() else {
            panic!("expected media payload");
        };
        assert_eq!(caption.as_deref(), Some("from the attachment"));
    }

    #[test]
    fn voice_sends_as_audio() {
        let mut attachment = image_attachment("media-1");
        attachment.kind = MessageKind::Voice;
        let message = with_attachment(
            outbound(MessageKind::Voice, "", serde_json::json!({})),
            attachment,
        );
        let OutboundPayload::Media { media_type, .. } = encode(&message).unwrap() else {
            panic!("expected media payload");
        };
        assert_eq!(media_type, MediaType::Audio);
    }

    #[test]
    fn inbound_only_kinds_are_rejected() {
        for kind in [
            MessageKind::Location,
            MessageKind::Contacts,
            MessageKind::Interactive,
        ] {
            let err = encode(&outbound(kind, "x", serde_json::json!({}))).unwrap_err();
            assert!(matches!(err, DeliveryError::Config(_)), "kind {kind:?}");
        }
    }
}
