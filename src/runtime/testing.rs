//! Mock implementations for testing
//!
//! These mocks enable end-to-end engine tests without network I/O.

use super::executor::ConversationEngine;
use super::traits::*;
use crate::messenger::{OutboundMessage, SendError};
use crate::reports::{ReportError, Submission};
use crate::session::SessionStore;
use crate::state_machine::flow::EMERGENCY;
use crate::state_machine::{Flow, Session, SessionUpdate};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Message Sender
// ============================================================================

/// Records every message; can be slowed down or made to fail
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    fail: AtomicBool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    /// Highest number of concurrent sends to one recipient observed
    max_in_flight: AtomicUsize,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), SendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(SendError::from_status(
                400,
                "This person isn't available right now",
            ));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.clone()));
        Ok(())
    }
}

// ============================================================================
// Recording Report Sink
// ============================================================================

#[derive(Default)]
pub struct RecordingReportSink {
    submissions: Mutex<Vec<Submission>>,
    fail: AtomicBool,
}

impl RecordingReportSink {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingReportSink {
    async fn submit(&self, submission: &Submission) -> Result<(), ReportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReportError::HttpStatus(503));
        }
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

// ============================================================================
// Test Engine Builder
// ============================================================================

pub type MockEngine = ConversationEngine<Arc<MockSender>, Arc<RecordingReportSink>>;

/// Builder for an engine wired to mocks
pub struct TestEngine {
    flow: &'static Flow,
    sender: MockSender,
    send_timeout: Duration,
}

/// A built engine plus handles on its mocks
pub struct TestHarness {
    pub engine: Arc<MockEngine>,
    pub sender: Arc<MockSender>,
    pub reports: Arc<RecordingReportSink>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self {
            flow: &EMERGENCY,
            sender: MockSender::new(),
            send_timeout: Duration::from_secs(2),
        }
    }

    pub fn flow(mut self, flow: &'static Flow) -> Self {
        self.flow = flow;
        self
    }

    pub fn sender(mut self, sender: MockSender) -> Self {
        self.sender = sender;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(SessionStore::new(self.flow.entry()));
        let sender = Arc::new(self.sender);
        let reports = Arc::new(RecordingReportSink::default());
        let engine = ConversationEngine::new(
            self.flow,
            store,
            Arc::clone(&sender),
            Arc::clone(&reports),
            self.send_timeout,
        );
        TestHarness {
            engine: Arc::new(engine),
            sender,
            reports,
        }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn store(&self) -> &SessionStore {
        self.engine.store()
    }

    /// Apply `update` to a fresh or existing session without going through the conversation
    pub async fn seed(&self, sender_id: &str, update: SessionUpdate) -> Session {
        self.store().get_or_create(sender_id).await;
        self.store().update(sender_id, update).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::{FINALIZE_FAILED, SEND_FAILED};
    use crate::state_machine::flow::LOCATION;
    use crate::state_machine::transition::{CANCELLED, RESUME};
    use crate::state_machine::state::FieldValue;
    use crate::state_machine::{Attachment, GeoPoint, Input, Step};

    fn bodies(messages: &[OutboundMessage]) -> Vec<&str> {
        messages.iter().map(OutboundMessage::body).collect()
    }

    fn prompt(step: Step) -> OutboundMessage {
        EMERGENCY.step(step).unwrap().prompt_message()
    }

    #[tokio::test]
    async fn test_help_starts_session_at_entry() {
        let h = TestEngine::new().build();

        let replies = h.engine.handle_input("u1", &Input::text("help")).await;

        assert_eq!(replies, vec![prompt(Step::AssistanceType)]);
        let session = h.store().get("u1").await.unwrap();
        assert_eq!(session.current_step, Step::AssistanceType);
        assert!(session.collected.is_empty());
        assert_eq!(h.sender.sent_to("u1"), replies);
    }

    #[tokio::test]
    async fn test_urgency_payload_is_stored_and_advances() {
        let h = TestEngine::new().build();
        h.seed("u1", SessionUpdate::advance(Step::Urgency)).await;

        let replies = h
            .engine
            .handle_input("u1", &Input::quick_reply("URGENCY_CRITICAL"))
            .await;

        let session = h.store().get("u1").await.unwrap();
        assert_eq!(session.current_step, Step::People);
        assert_eq!(
            session.collected.get("urgencyLevel"),
            Some(&FieldValue::Text("CRITICAL".into()))
        );
        assert_eq!(replies, vec![prompt(Step::People)]);
    }

    #[tokio::test]
    async fn test_negative_count_reprompts_and_keeps_state() {
        let h = TestEngine::new().build();
        let before = h
            .seed(
                "u1",
                SessionUpdate::advance(Step::People)
                    .with_field("urgencyLevel", FieldValue::Text("HIGH".into())),
            )
            .await;

        let replies = h.engine.handle_input("u1", &Input::text("-3")).await;

        let after = h.store().get("u1").await.unwrap();
        assert_eq!(after.current_step, Step::People);
        assert_eq!(after.collected, before.collected);
        assert_eq!(
            replies,
            vec![EMERGENCY.step(Step::People).unwrap().retry_message()]
        );
    }

    #[tokio::test]
    async fn test_skip_on_last_step_finalizes_and_deletes() {
        let h = TestEngine::new().build();
        h.seed(
            "u1",
            SessionUpdate::advance(Step::Image)
                .with_field("peopleCount", FieldValue::Number(2))
                .with_field("urgencyLevel", FieldValue::Text("LOW".into())),
        )
        .await;

        let replies = h.engine.handle_input("u1", &Input::text("skip")).await;

        assert!(h.store().get("u1").await.is_none());
        let submissions = h.reports.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].flow, "emergency");
        assert_eq!(submissions[0].sender_id, "u1");
        assert_eq!(
            submissions[0].fields.get("peopleCount"),
            Some(&FieldValue::Number(2))
        );
        assert_eq!(replies.len(), 1);
        assert!(replies[0].body().starts_with(EMERGENCY.completion));

        // Finished: the next unrelated text only gets the welcome
        let replies = h.engine.handle_input("u1", &Input::text("thanks again")).await;
        assert_eq!(replies, vec![OutboundMessage::text(EMERGENCY.welcome)]);
        assert!(h.store().get("u1").await.is_none());
        assert_eq!(h.store().len().await, 0);
        assert_eq!(h.reports.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_full_emergency_conversation() {
        let h = TestEngine::new().build();
        let inputs = [
            Input::text("hi"),
            Input::quick_reply("ASSIST_MEDICAL"),
            Input::Attachment(Attachment::Location(GeoPoint {
                lat: 14.6,
                long: 121.0,
            })),
            Input::text("+63 917 555 0100"),
            Input::text("high"),
            Input::text("4"),
            Input::text("insulin"),
            Input::quick_reply("YES"),
            Input::text("blankets"),
            Input::text("no"),
            Input::text("skip"),
            Input::Attachment(Attachment::Image {
                url: "https://cdn.example/flood.jpg".into(),
            }),
        ];
        for input in &inputs {
            h.engine.handle_input("u1", input).await;
        }

        assert!(h.store().get("u1").await.is_none());
        let submissions = h.reports.submissions();
        assert_eq!(submissions.len(), 1);
        let fields = &submissions[0].fields;
        assert_eq!(fields["assistanceType"], FieldValue::Text("MEDICAL".into()));
        assert_eq!(fields["contactPhone"], FieldValue::Text("+639175550100".into()));
        assert_eq!(fields["urgencyLevel"], FieldValue::Text("HIGH".into()));
        assert_eq!(fields["peopleCount"], FieldValue::Number(4));
        assert_eq!(
            fields["needs"],
            FieldValue::List(vec!["insulin".into(), "blankets".into()])
        );
        assert!(!fields.contains_key("notes"));
        assert_eq!(
            fields["imageUrl"],
            FieldValue::Text("https://cdn.example/flood.jpg".into())
        );
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let h = TestEngine::new().build();
        h.engine.handle_input("u1", &Input::text("help")).await;

        for _ in 0..2 {
            let replies = h.engine.handle_input("u1", &Input::text("Cancel")).await;
            assert_eq!(bodies(&replies), vec![CANCELLED]);
            assert!(h.store().get("u1").await.is_none());
        }
    }

    #[tokio::test]
    async fn test_unknown_sender_gets_welcome_without_session() {
        let h = TestEngine::new().build();
        let replies = h.engine.handle_input("u1", &Input::text("my house is flooded")).await;

        assert_eq!(bodies(&replies), vec![EMERGENCY.welcome]);
        assert_eq!(h.store().len().await, 0);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_session_and_apologizes_once() {
        let h = TestEngine::new().build();
        h.sender.set_failing(true);

        let replies = h.engine.handle_input("u1", &Input::text("help")).await;

        assert_eq!(
            bodies(&replies),
            vec![prompt(Step::AssistanceType).body(), SEND_FAILED]
        );
        assert_eq!(
            h.store().get("u1").await.unwrap().current_step,
            Step::AssistanceType
        );
    }

    #[tokio::test]
    async fn test_send_failure_skips_remaining_messages() {
        let h = TestEngine::new().build();
        h.seed("u1", SessionUpdate::advance(Step::Location)).await;
        h.sender.set_failing(true);

        // Resume sends two messages; only the first is attempted
        let replies = h.engine.handle_input("u1", &Input::text("help")).await;
        assert_eq!(bodies(&replies), vec![RESUME, SEND_FAILED]);
    }

    #[tokio::test]
    async fn test_finalize_failure_keeps_session_unchanged() {
        let h = TestEngine::new().build();
        let before = h
            .seed(
                "u1",
                SessionUpdate::advance(Step::Image).with_field("peopleCount", FieldValue::Number(1)),
            )
            .await;
        h.reports.set_failing(true);

        let replies = h.engine.handle_input("u1", &Input::text("skip")).await;

        assert_eq!(bodies(&replies), vec![FINALIZE_FAILED]);
        let after = h.store().get("u1").await.unwrap();
        assert_eq!(after.current_step, Step::Image);
        assert_eq!(after.collected, before.collected);

        // Retrying once the sink recovers completes normally
        h.reports.set_failing(false);
        h.engine.handle_input("u1", &Input::text("skip")).await;
        assert!(h.store().get("u1").await.is_none());
        assert_eq!(h.reports.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_same_sender_inputs_are_serialized() {
        let h = TestEngine::new()
            .sender(MockSender::with_delay(Duration::from_millis(30)))
            .build();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let engine = Arc::clone(&h.engine);
                tokio::spawn(async move { engine.handle_input("u1", &Input::text("help")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(h.sender.max_in_flight(), 1);
        // One start, one resume; never two starts
        let sent = h.sender.sent_to("u1");
        assert_eq!(sent.len(), 3);
        assert_eq!(sent.iter().filter(|m| m.body() == RESUME).count(), 1);
    }

    #[tokio::test]
    async fn test_different_senders_run_concurrently() {
        let h = TestEngine::new()
            .sender(MockSender::with_delay(Duration::from_millis(50)))
            .build();

        let a = {
            let engine = Arc::clone(&h.engine);
            tokio::spawn(async move { engine.handle_input("a", &Input::text("help")).await })
        };
        let b = {
            let engine = Arc::clone(&h.engine);
            tokio::spawn(async move { engine.handle_input("b", &Input::text("help")).await })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(h.sender.max_in_flight(), 2);
        assert_eq!(h.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_slow_send_is_bounded_by_timeout() {
        let h = TestEngine::new()
            .sender(MockSender::with_delay(Duration::from_millis(500)))
            .send_timeout(Duration::from_millis(20))
            .build();

        let started = std::time::Instant::now();
        let replies = h.engine.handle_input("u1", &Input::text("help")).await;

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(bodies(&replies)[1], SEND_FAILED);
        assert!(h.store().get("u1").await.is_some());
        // Nothing actually went out
        assert!(h.sender.sent_to("u1").is_empty());
    }

    #[tokio::test]
    async fn test_session_from_other_flow_is_discarded() {
        let h = TestEngine::new().flow(&LOCATION).build();
        h.seed("u1", SessionUpdate::advance(Step::Urgency)).await;

        let replies = h.engine.handle_input("u1", &Input::text("high")).await;

        assert_eq!(bodies(&replies), vec![LOCATION.welcome]);
        assert!(h.store().get("u1").await.is_none());
    }
}
