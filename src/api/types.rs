//! API request and response types

use serde::{Deserialize, Serialize};

/// Query string of the subscription handshake
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Body of a webhook delivery
///
/// Messaging events stay as raw JSON here so one malformed event can be
/// skipped without rejecting the whole batch.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Vec<serde_json::Value>,
}

/// One element of `entry[].messaging`
#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Option<Party>,
    pub message: Option<IncomingMessage>,
    pub postback: Option<Postback>,
    pub delivery: Option<serde_json::Value>,
    pub read: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    /// Set on copies of messages the page itself sent
    #[serde(default)]
    pub is_echo: bool,
    pub text: Option<String>,
    pub quick_reply: Option<QuickReplyPayload>,
    #[serde(default)]
    pub attachments: Vec<IncomingAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct IncomingAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub url: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Present on stickers, which arrive as `image` attachments
    pub sticker_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    pub payload: String,
}

/// Response for `/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub flow: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
