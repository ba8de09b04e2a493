//! Outbound messaging
//!
//! Message types, the Graph API client and a logging wrapper around any
//! `MessageSender`.

mod error;
mod graph;
mod types;

pub use error::SendError;
pub use graph::{GraphApiSender, DEFAULT_GRAPH_API_URL};
pub use types::{OutboundMessage, QuickReply};

use crate::runtime::MessageSender;
use async_trait::async_trait;
use std::sync::Arc;

/// Logging wrapper for message senders
pub struct LoggingSender {
    inner: Arc<dyn MessageSender>,
}

impl LoggingSender {
    pub fn new(inner: Arc<dyn MessageSender>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), SendError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(recipient, message).await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => {
                tracing::debug!(
                    recipient,
                    duration_ms = %duration.as_millis(),
                    quick_replies = message.quick_replies().len(),
                    "Message sent"
                );
            }
            Err(e) => {
                tracing::warn!(
                    recipient,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    "Message send failed"
                );
            }
        }

        result
    }
}
