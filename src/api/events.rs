//! Turning raw messaging events into engine inputs

use super::types::{IncomingAttachment, IncomingMessage, MessagingEvent, WebhookPayload};
use crate::state_machine::{Attachment, GeoPoint, Input};
use serde_json::Value;
use thiserror::Error;

/// A parsed input attributed to its sender
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub sender_id: String,
    pub input: Input,
}

/// Why a messaging event was skipped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("Unexpected event shape: {0}")]
    Shape(String),
    #[error("Event has no sender id")]
    MissingSender,
    #[error("Event carries no text, quick reply, attachment or postback")]
    NoContent,
}

/// Parse one element of `entry[].messaging`
///
/// `Ok(None)` means the event is valid but not something the bot answers:
/// echoes of the page's own messages, delivery and read receipts.
pub fn parse_event(raw: Value) -> Result<Option<InboundEvent>, MalformedEvent> {
    let event: MessagingEvent =
        serde_json::from_value(raw).map_err(|e| MalformedEvent::Shape(e.to_string()))?;

    if event.message.as_ref().is_some_and(|m| m.is_echo) {
        return Ok(None);
    }
    if event.message.is_none()
        && event.postback.is_none()
        && (event.delivery.is_some() || event.read.is_some())
    {
        return Ok(None);
    }

    let sender_id = event
        .sender
        .map(|s| s.id)
        .filter(|id| !id.is_empty())
        .ok_or(MalformedEvent::MissingSender)?;

    let input = match (event.message, event.postback) {
        (Some(message), _) => message_input(message),
        (None, Some(postback)) => Some(Input::quick_reply(postback.payload)),
        (None, None) => None,
    }
    .ok_or(MalformedEvent::NoContent)?;

    Ok(Some(InboundEvent { sender_id, input }))
}

/// Quick-reply payload first, then text, then the first attachment
fn message_input(message: IncomingMessage) -> Option<Input> {
    if let Some(quick_reply) = message.quick_reply {
        return Some(Input::quick_reply(quick_reply.payload));
    }
    if let Some(text) = message.text.filter(|t| !t.trim().is_empty()) {
        return Some(Input::text(text));
    }
    message
        .attachments
        .into_iter()
        .next()
        .map(|a| Input::Attachment(attachment(a)))
}

fn attachment(raw: IncomingAttachment) -> Attachment {
    let payload = raw.payload;
    match raw.kind.as_str() {
        "location" => {
            if let Some(c) = payload.as_ref().and_then(|p| p.coordinates) {
                return Attachment::Location(GeoPoint {
                    lat: c.lat,
                    long: c.long,
                });
            }
        }
        "image" => match payload {
            Some(p) if p.sticker_id.is_some() => {
                return Attachment::Other {
                    kind: "sticker".to_string(),
                };
            }
            Some(p) => {
                if let Some(url) = p.url {
                    return Attachment::Image { url };
                }
            }
            None => {}
        },
        _ => {}
    }
    Attachment::Other { kind: raw.kind }
}

/// Every answerable event in a delivery, in arrival order
///
/// Malformed events are logged and dropped; the rest of the batch proceeds.
pub fn collect_events(payload: WebhookPayload) -> Vec<InboundEvent> {
    payload
        .entry
        .into_iter()
        .flat_map(|entry| entry.messaging)
        .filter_map(|raw| match parse_event(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed messaging event");
                None
            }
        })
        .collect()
}
