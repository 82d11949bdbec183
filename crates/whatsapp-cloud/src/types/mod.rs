//! Wire types for the Cloud API.

pub mod send;
pub mod webhook;

pub use send::{
    MediaBody, MediaType, SendRequest, SendResponse, StatusUpdateRequest, TemplateBody,
    TemplateComponent, TemplateLanguage, TemplateParameter, TextBody,
};
pub use webhook::{
    Change, ChangeValue, ContactProfile, Entry, InteractivePayload, InteractiveReply,
    LocationPayload, MediaPayload, TextPayload, WebhookContact, WebhookMessage, WebhookMetadata,
    WebhookPayload,
};
