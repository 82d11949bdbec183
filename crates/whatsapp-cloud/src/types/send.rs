//! Types for sending messages via the Cloud API.

use serde::{Deserialize, Serialize};

/// Media kinds the messages endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Document,
    Audio,
    Video,
    Sticker,
}

impl MediaType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Sticker => "sticker",
        }
    }
}

/// A request against the messages endpoint.
///
/// Exactly one of the body fields is set, matching the `type` tag.
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker: Option<MediaBody>,
}

impl SendRequest {
    fn new(to: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: to.into(),
            kind: kind.into(),
            text: None,
            template: None,
            image: None,
            document: None,
            audio: None,
            video: None,
            sticker: None,
        }
    }

    /// Create a text message request.
    pub fn text(to: impl Into<String>, body: impl Into<String>, preview_url: bool) -> Self {
        let mut request = Self::new(to, "text");
        request.text = Some(TextBody {
            body: body.into(),
            preview_url,
        });
        request
    }

    /// Create a template message request.
    pub fn template(
        to: impl Into<String>,
        name: impl Into<String>,
        language_code: impl Into<String>,
        parameters: Vec<TemplateParameter>,
    ) -> Self {
        let components = if parameters.is_empty() {
            vec![]
        } else {
            vec![TemplateComponent {
                component_type: "body".to_string(),
                parameters,
            }]
        };
        let mut request = Self::new(to, "template");
        request.template = Some(TemplateBody {
            name: name.into(),
            language: TemplateLanguage {
                code: language_code.into(),
            },
            components,
        });
        request
    }

    /// Create a media message request referencing an uploaded media id.
    pub fn media(
        to: impl Into<String>,
        media_type: MediaType,
        media_id: impl Into<String>,
        caption: Option<String>,
        filename: Option<String>,
    ) -> Self {
        let body = MediaBody {
            id: media_id.into(),
            // Audio and sticker payloads reject caption/filename fields.
            caption: match media_type {
                MediaType::Audio | MediaType::Sticker => None,
                _ => caption,
            },
            filename: match media_type {
                MediaType::Document => filename,
                _ => None,
            },
        };
        let mut request = Self::new(to, media_type.as_str());
        match media_type {
            MediaType::Image => request.image = Some(body),
            MediaType::Document => request.document = Some(body),
            MediaType::Audio => request.audio = Some(body),
            MediaType::Video => request.video = Some(body),
            MediaType::Sticker => request.sticker = Some(body),
        }
        request
    }
}

/// Text body with optional link preview.
#[derive(Debug, Clone, Serialize)]
pub struct TextBody {
    pub body: String,
    pub preview_url: bool,
}

/// Template reference with language and body parameters.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateBody {
    pub name: String,
    pub language: TemplateLanguage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<TemplateComponent>,
}

/// Template language selector.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateLanguage {
    pub code: String,
}

/// One component of a template (only body parameters are produced here).
#[derive(Debug, Clone, Serialize)]
pub struct TemplateComponent {
    #[serde(rename = "type")]
    pub component_type: String,
    pub parameters: Vec<TemplateParameter>,
}

/// A positional text parameter for a template body.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateParameter {
    #[serde(rename = "type")]
    pub parameter_type: String,
    pub text: String,
}

impl TemplateParameter {
    /// A plain text parameter.
    pub fn text_param(text: impl Into<String>) -> Self {
        Self {
            parameter_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Reference to an uploaded media object.
#[derive(Debug, Clone, Serialize)]
pub struct MediaBody {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Mark-as-read request against the messages endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateRequest {
    pub messaging_product: &'static str,
    pub status: &'static str,
    pub message_id: String,
}

impl StatusUpdateRequest {
    /// Mark an inbound message as read.
    pub fn read(message_id: impl Into<String>) -> Self {
        Self {
            messaging_product: "whatsapp",
            status: "read",
            message_id: message_id.into(),
        }
    }
}

/// Response from a successful send.
///
/// Serializable so callers can retain it in message metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messaging_product: String,

    #[serde(default)]
    pub contacts: Vec<SendResponseContact>,

    #[serde(default)]
    pub messages: Vec<SendResponseMessage>,
}

impl SendResponse {
    /// Provider-assigned id of the accepted message, if present.
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

/// Normalized recipient info in a send response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponseContact {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub wa_id: String,
}

/// Accepted message info in a send response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponseMessage {
    #[serde(default)]
    pub id: String,
}
