//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the engine with mock implementations.

use crate::messenger::{OutboundMessage, SendError};
use crate::reports::{ReportError, Submission};
use async_trait::async_trait;
use std::sync::Arc;

/// The outbound "Send" capability
///
/// Wire format, credentials and transport concerns live behind this trait.
/// The engine makes a single attempt per message.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), SendError>;
}

/// Consumer of finished forms
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<(), ReportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: MessageSender + ?Sized> MessageSender for Arc<T> {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), SendError> {
        (**self).send(recipient, message).await
    }
}

#[async_trait]
impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    async fn submit(&self, submission: &Submission) -> Result<(), ReportError> {
        (**self).submit(submission).await
    }
}
