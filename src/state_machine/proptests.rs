//! Property-based tests for the state machine
//!
//! Drives random input sequences through `transition`, applying the effects
//! to a local session, and checks the invariants after every step.

use super::flow::FlowKind;
use super::state::FieldValue;
use super::validate::{is_cancel, is_start, validate, Verdict};
use super::*;
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

/// Apply session effects the way the store would
fn apply(flow: &Flow, session: &mut Option<Session>, effects: &[Effect]) -> Option<Collected> {
    let mut finalized = None;
    for effect in effects {
        match effect {
            Effect::StartSession => *session = Some(Session::new("prop", flow.entry(), Utc::now())),
            Effect::UpdateSession(update) => {
                if let Some(s) = session.as_mut() {
                    if let Some(step) = update.step {
                        s.current_step = step;
                    }
                    s.collected
                        .extend(update.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Effect::DeleteSession => *session = None,
            Effect::Finalize { collected } => finalized = Some(collected.clone()),
            Effect::TouchSession | Effect::Send(_) => {}
        }
    }
    finalized
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_flow() -> impl Strategy<Value = FlowKind> {
    prop_oneof![
        Just(FlowKind::Emergency),
        Just(FlowKind::MissingPet),
        Just(FlowKind::Location),
    ]
}

fn arb_text() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just("help"),
        Just("cancel"),
        Just("skip"),
        Just("yes"),
        Just("no"),
        Just("abc"),
        Just("-3"),
        Just("0"),
        Just("4"),
        Just("critical"),
        Just("water"),
        Just("dog"),
        Just("+1 555 123 4567"),
        Just("Main street bridge"),
        Just("x"),
    ]
    .prop_map(Input::text)
}

fn arb_payload() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just("GET_STARTED"),
        Just("URGENCY_HIGH"),
        Just("URGENCY_CRITICAL"),
        Just("ASSIST_MEDICAL"),
        Just("SPECIES_CAT"),
        Just("YES"),
        Just("NO"),
        Just("SKIP"),
        Just("BOGUS"),
    ]
    .prop_map(Input::quick_reply)
}

fn arb_attachment() -> impl Strategy<Value = Input> {
    prop_oneof![
        (-90.0f64..90.0, -180.0f64..180.0)
            .prop_map(|(lat, long)| Attachment::Location(GeoPoint { lat, long })),
        "[a-z]{4,8}".prop_map(|name| Attachment::Image {
            url: format!("https://cdn.example/{name}.jpg")
        }),
        Just(Attachment::Other {
            kind: "audio".to_string()
        }),
    ]
    .prop_map(Input::Attachment)
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        4 => arb_text(),
        3 => arb_payload(),
        1 => arb_attachment(),
        1 => "[a-z ]{0,12}".prop_map(Input::Text),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every observed step change follows an edge of the static graph, and
    /// collected fields only grow while the session lives.
    #[test]
    fn prop_steps_follow_the_graph(
        kind in arb_flow(),
        inputs in proptest::collection::vec(arb_input(), 1..40),
    ) {
        let flow = kind.flow();
        let mut session: Option<Session> = None;

        for input in &inputs {
            let before = session.clone();
            let result = transition(flow, before.as_ref(), input)
                .expect("sessions built by the flow always have a known step");
            let finalized = apply(flow, &mut session, &result.effects);

            match (&before, &session) {
                (None, Some(after)) => {
                    prop_assert_eq!(after.current_step, flow.entry());
                    prop_assert!(after.collected.is_empty());
                }
                (Some(b), Some(a)) => {
                    if a.current_step != b.current_step {
                        let def = flow.step(b.current_step).unwrap();
                        prop_assert!(
                            def.successors().contains(&a.current_step),
                            "{} -> {} is not an edge", b.current_step, a.current_step
                        );
                    }
                    for key in b.collected.keys() {
                        prop_assert!(a.collected.contains_key(key));
                    }
                }
                (Some(b), None) => {
                    // Ended by cancel or by finishing the last step
                    let def = flow.step(b.current_step).unwrap();
                    prop_assert!(
                        is_cancel(input)
                            || (finalized.is_some() && def.successors().contains(&Step::Complete))
                    );
                }
                (None, None) => prop_assert!(finalized.is_none()),
            }
        }
    }

    /// An input the current step rejects only touches the session and
    /// re-prompts; step and fields stay as they were
    #[test]
    fn prop_rejection_does_not_mutate(
        kind in arb_flow(),
        inputs in proptest::collection::vec(arb_input(), 1..30),
        answer in arb_input(),
    ) {
        let flow = kind.flow();
        let mut session: Option<Session> = None;
        for input in &inputs {
            let result = transition(flow, session.as_ref(), input).unwrap();
            apply(flow, &mut session, &result.effects);
        }

        let Some(current) = session.clone() else { return Ok(()) };
        let def = flow.step(current.current_step).unwrap();
        let acknowledged_image =
            matches!(answer, Input::Attachment(Attachment::Image { .. })) && !def.rule.accepts_image();
        let rejected = match validate(def, &answer) {
            Verdict::Reject(_) => true,
            Verdict::Skip => !def.is_optional(),
            Verdict::Accept(_) | Verdict::Answer(_) => false,
        };
        prop_assume!(rejected && !is_cancel(&answer) && !is_start(&answer) && !acknowledged_image);

        let result = transition(flow, Some(&current), &answer).unwrap();
        prop_assert_eq!(
            &result.effects,
            &vec![Effect::TouchSession, Effect::send(def.retry_message())]
        );
        apply(flow, &mut session, &result.effects);
        let after = session.unwrap();
        prop_assert_eq!(after.current_step, current.current_step);
        prop_assert_eq!(after.collected, current.collected);
    }

    /// Finalization only ever hands over fields the flow defines
    #[test]
    fn prop_finalized_fields_belong_to_flow(
        kind in arb_flow(),
        inputs in proptest::collection::vec(arb_input(), 1..60),
    ) {
        let flow = kind.flow();
        let known: Vec<&str> = flow.steps.iter().filter_map(|d| d.write.field()).collect();
        let mut session: Option<Session> = None;

        for input in &inputs {
            let result = transition(flow, session.as_ref(), input).unwrap();
            if let Some(collected) = apply(flow, &mut session, &result.effects) {
                for key in collected.keys() {
                    prop_assert!(known.contains(&key.as_str()), "unexpected field {}", key);
                }
                prop_assert!(session.is_none());
            }
        }
    }
}

/// Walk the whole emergency flow with valid answers
#[test]
fn test_happy_path_visits_steps_in_order() {
    let flow = FlowKind::Emergency.flow();
    let script = [
        Input::text("help"),
        Input::quick_reply("ASSIST_MEDICAL"),
        Input::text("Riverside school gym"),
        Input::text("+63 917 555 0101"),
        Input::quick_reply("URGENCY_HIGH"),
        Input::text("5"),
        Input::text("insulin"),
        Input::quick_reply("YES"),
        Input::text("blankets"),
        Input::quick_reply("NO"),
        Input::text("skip"),
        Input::Attachment(Attachment::Image {
            url: "https://cdn.example/gym.jpg".into(),
        }),
    ];
    let expected = [
        Step::AssistanceType,
        Step::Location,
        Step::Contact,
        Step::Urgency,
        Step::People,
        Step::Needs,
        Step::MoreNeeds,
        Step::Needs,
        Step::MoreNeeds,
        Step::Notes,
        Step::Image,
    ];

    let mut session = None;
    let mut visited = Vec::new();
    let mut finalized = None;
    for input in &script {
        let result = transition(flow, session.as_ref(), input).unwrap();
        if let Some(done) = apply(flow, &mut session, &result.effects) {
            finalized = Some(done);
        }
        if let Some(s) = &session {
            visited.push(s.current_step);
        }
    }

    assert_eq!(visited, expected);
    assert!(session.is_none());
    let collected = finalized.unwrap();
    assert_eq!(
        collected.get("needs"),
        Some(&FieldValue::List(vec!["insulin".into(), "blankets".into()]))
    );
    assert_eq!(collected.get("peopleCount"), Some(&FieldValue::Number(5)));
    assert_eq!(
        collected.get("contactPhone"),
        Some(&FieldValue::Text("+639175550101".into()))
    );
    assert!(!collected.contains_key("notes"));
}
