//! Effects produced by state transitions

use super::state::{Collected, SessionUpdate};
use crate::messenger::OutboundMessage;

/// Effects to be executed, in order, after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create the sender's session at the flow's entry step
    StartSession,

    /// Merge fields and/or a new step into the session
    UpdateSession(SessionUpdate),

    /// Refresh `last_activity_at` without changing anything else
    TouchSession,

    /// Remove the sender's session
    DeleteSession,

    /// Hand the completed form to the report sink
    Finalize { collected: Collected },

    /// Deliver a message to the sender
    Send(OutboundMessage),
}

impl Effect {
    pub fn send(message: OutboundMessage) -> Self {
        Effect::Send(message)
    }

    pub fn send_text(text: impl Into<String>) -> Self {
        Effect::Send(OutboundMessage::text(text))
    }

    #[cfg(test)]
    pub fn is_send(&self) -> bool {
        matches!(self, Effect::Send(_))
    }
}
