//! Inputs that drive a conversation

use super::state::GeoPoint;

/// A single user input attributed to one sender
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Free text typed by the user
    Text(String),
    /// A quick-reply or postback selection, carried by its payload
    QuickReply(String),
    Attachment(Attachment),
}

/// Attachment sent by the user
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Location(GeoPoint),
    Image { url: String },
    /// Any attachment kind the flows never ask for (audio, file, ...)
    Other { kind: String },
}

impl Input {
    pub fn text(text: impl Into<String>) -> Self {
        Input::Text(text.into())
    }

    pub fn quick_reply(payload: impl Into<String>) -> Self {
        Input::QuickReply(payload.into())
    }

    /// Short tag for logging, never the user's content
    pub fn kind(&self) -> &'static str {
        match self {
            Input::Text(_) => "text",
            Input::QuickReply(_) => "quick_reply",
            Input::Attachment(Attachment::Location(_)) => "location",
            Input::Attachment(Attachment::Image { .. }) => "image",
            Input::Attachment(Attachment::Other { .. }) => "attachment",
        }
    }
}
