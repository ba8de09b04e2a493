//! Outbound message types

use serde::Serialize;

/// A quick-reply option offered under a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum QuickReply {
    Text { title: String, payload: String },
    /// Lets the user share the phone number on their profile in one tap
    UserPhoneNumber,
}

impl QuickReply {
    pub fn text(title: impl Into<String>, payload: impl Into<String>) -> Self {
        QuickReply::Text {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// A reply produced by the engine; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    quick_replies: Vec<QuickReply>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quick_replies: Vec::new(),
        }
    }

    pub fn with_quick_replies(text: impl Into<String>, quick_replies: Vec<QuickReply>) -> Self {
        Self {
            text: text.into(),
            quick_replies,
        }
    }

    #[cfg(test)]
    pub fn body(&self) -> &str {
        &self.text
    }

    pub fn quick_replies(&self) -> &[QuickReply] {
        &self.quick_replies
    }

    /// Payloads of the text quick replies, in display order
    #[cfg(test)]
    pub fn payloads(&self) -> Vec<&str> {
        self.quick_replies
            .iter()
            .filter_map(|qr| match qr {
                QuickReply::Text { payload, .. } => Some(payload.as_str()),
                QuickReply::UserPhoneNumber => None,
            })
            .collect()
    }
}
