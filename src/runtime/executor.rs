//! Conversation engine: runs one input through the transition and applies effects

use super::traits::{MessageSender, ReportSink};
use crate::messenger::{OutboundMessage, SendError};
use crate::reports::{ReportError, Submission};
use crate::session::SessionStore;
use crate::state_machine::{transition, Effect, Flow, Input};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub const SEND_FAILED: &str =
    "Sorry, we had trouble replying. If you don't see a question, send your last answer again.";
pub const FINALIZE_FAILED: &str =
    "Sorry, we couldn't submit your report just now. Please send your last answer again.";

/// Applies transitions for one flow against the shared session store
///
/// Each `handle_input` call holds the sender's lock from lookup until the last
/// send returns, so a sender's inputs are processed strictly one at a time.
/// Every send and report submission is bounded by `send_timeout`.
pub struct ConversationEngine<M, R>
where
    M: MessageSender,
    R: ReportSink,
{
    flow: &'static Flow,
    store: Arc<SessionStore>,
    sender: M,
    reports: R,
    send_timeout: Duration,
}

/// What happened to outbound messages during one input
#[derive(Default)]
struct Delivery {
    handed_off: Vec<OutboundMessage>,
    failed: bool,
}

impl<M, R> ConversationEngine<M, R>
where
    M: MessageSender,
    R: ReportSink,
{
    pub fn new(
        flow: &'static Flow,
        store: Arc<SessionStore>,
        sender: M,
        reports: R,
        send_timeout: Duration,
    ) -> Self {
        Self {
            flow,
            store,
            sender,
            reports,
            send_timeout,
        }
    }

    pub fn flow(&self) -> &'static Flow {
        self.flow
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Process one input for one sender
    ///
    /// Returns every message handed to the sender, including apologies, in
    /// the order they were attempted.
    pub async fn handle_input(&self, sender_id: &str, input: &Input) -> Vec<OutboundMessage> {
        let _guard = self.store.lock(sender_id).await;
        let session = self.store.get(sender_id).await;
        let mut delivery = Delivery::default();

        let result = match transition(self.flow, session.as_ref(), input) {
            Ok(result) => result,
            Err(e) => {
                // Only reachable if a session outlived a flow change
                tracing::error!(sender_id, error = %e, "Discarding session");
                self.store.delete(sender_id).await;
                self.deliver(sender_id, OutboundMessage::text(self.flow.welcome), &mut delivery)
                    .await;
                return delivery.handed_off;
            }
        };

        tracing::debug!(
            sender_id,
            input = input.kind(),
            step = ?session.as_ref().map(|s| s.current_step),
            effects = result.effects.len(),
            "Transition"
        );

        for effect in result.effects {
            match effect {
                Effect::StartSession => {
                    let started = self.store.get_or_create(sender_id).await;
                    tracing::info!(
                        sender_id,
                        flow = self.flow.name,
                        step = %started.current_step,
                        "Session started"
                    );
                }
                Effect::UpdateSession(update) => {
                    if let Some(updated) = self.store.update(sender_id, update).await {
                        tracing::debug!(sender_id, step = %updated.current_step, "Session advanced");
                    } else {
                        tracing::warn!(sender_id, "Update for a session that no longer exists");
                    }
                }
                Effect::TouchSession => {
                    self.store.touch(sender_id).await;
                }
                Effect::DeleteSession => self.store.delete(sender_id).await,
                Effect::Finalize { collected } => {
                    let started_at = session.as_ref().map_or_else(Utc::now, |s| s.created_at);
                    let submission =
                        Submission::new(self.flow.name, sender_id, collected, started_at);
                    if let Err(e) = self.submit(&submission).await {
                        tracing::error!(
                            sender_id,
                            submission_id = %submission.id,
                            error = %e,
                            "Finalization failed, keeping session"
                        );
                        self.deliver(
                            sender_id,
                            OutboundMessage::text(FINALIZE_FAILED),
                            &mut delivery,
                        )
                        .await;
                        break;
                    }
                }
                Effect::Send(message) => self.deliver(sender_id, message, &mut delivery).await,
            }
        }

        delivery.handed_off
    }

    /// Send one message; after the first failure, try a single apology and
    /// drop the rest of this input's messages
    async fn deliver(&self, sender_id: &str, message: OutboundMessage, delivery: &mut Delivery) {
        if delivery.failed {
            tracing::debug!(sender_id, "Skipping send after earlier failure");
            return;
        }

        let result = self.send_bounded(sender_id, &message).await;
        delivery.handed_off.push(message);
        let Err(e) = result else {
            return;
        };

        delivery.failed = true;
        tracing::warn!(
            sender_id,
            kind = e.kind.as_str(),
            error = %e,
            "Reply not delivered, session kept"
        );

        let apology = OutboundMessage::text(SEND_FAILED);
        let result = self.send_bounded(sender_id, &apology).await;
        delivery.handed_off.push(apology);
        if let Err(e) = result {
            tracing::debug!(sender_id, error = %e, "Apology not delivered either");
        }
    }

    async fn send_bounded(&self, recipient: &str, message: &OutboundMessage) -> Result<(), SendError> {
        tokio::time::timeout(self.send_timeout, self.sender.send(recipient, message))
            .await
            .unwrap_or_else(|_| {
                Err(SendError::timeout(format!(
                    "No response within {}ms",
                    self.send_timeout.as_millis()
                )))
            })
    }

    async fn submit(&self, submission: &Submission) -> Result<(), ReportError> {
        tokio::time::timeout(self.send_timeout, self.reports.submit(submission))
            .await
            .unwrap_or(Err(ReportError::Timeout))
    }
}
