//! Pure state transition function
//!
//! Given the flow, the sender's current session (if any) and one input, decide
//! what happens. No I/O: the engine applies the returned effects in order.

use super::event::{Attachment, Input};
use super::flow::{Flow, Next, Skip, StepDef, Write};
use super::state::{Collected, FieldValue, Session, SessionUpdate, Step};
use super::validate::{is_cancel, is_start, validate, Verdict};
use super::Effect;
use thiserror::Error;

pub const CANCELLED: &str =
    "Okay, I've cancelled your request. Type \"help\" whenever you want to start again.";
pub const RESUME: &str = "Let's pick up where we left off.";
pub const IMAGE_RECEIVED: &str = "Thanks, we got your photo.";

/// Result of a state transition
#[derive(Debug, Default, PartialEq)]
pub struct TransitionResult {
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// The session change this transition makes, ignoring sends
    #[cfg(test)]
    pub fn session_effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().filter(|e| !e.is_send())
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Step '{step}' is not part of the '{flow}' flow")]
    UnknownStep { flow: &'static str, step: Step },
}

/// Pure transition function
pub fn transition(
    flow: &Flow,
    session: Option<&Session>,
    input: &Input,
) -> Result<TransitionResult, TransitionError> {
    // Cancel wins over everything, with or without a session
    if is_cancel(input) {
        return Ok(TransitionResult::new()
            .with_effect(Effect::DeleteSession)
            .with_effect(Effect::send_text(CANCELLED)));
    }

    if is_start(input) {
        return match session {
            None => {
                let entry = step_def(flow, flow.entry())?;
                Ok(TransitionResult::new()
                    .with_effect(Effect::StartSession)
                    .with_effect(Effect::send(entry.prompt_message())))
            }
            // Mid-flow: resume rather than reset, and don't treat the
            // keyword as an answer
            Some(session) => {
                let def = step_def(flow, session.current_step)?;
                Ok(TransitionResult::new()
                    .with_effect(Effect::TouchSession)
                    .with_effect(Effect::send_text(RESUME))
                    .with_effect(Effect::send(def.prompt_message())))
            }
        };
    }

    let Some(session) = session else {
        return Ok(TransitionResult::new().with_effect(Effect::send_text(flow.welcome)));
    };

    let def = step_def(flow, session.current_step)?;

    if let Input::Attachment(Attachment::Image { .. }) = input {
        if !def.rule.accepts_image() {
            return Ok(TransitionResult::new().with_effect(Effect::send_text(IMAGE_RECEIVED)));
        }
    }

    match validate(def, input) {
        Verdict::Reject(_) => Ok(TransitionResult::new()
            .with_effect(Effect::TouchSession)
            .with_effect(Effect::send(def.retry_message()))),

        Verdict::Skip => match def.skip {
            Skip::To(next) => advance(flow, session, SessionUpdate::default(), next),
            Skip::Required => Ok(TransitionResult::new()
                .with_effect(Effect::TouchSession)
                .with_effect(Effect::send(def.retry_message()))),
        },

        Verdict::Accept(value) => {
            let update = write_field(def, session, value);
            let next = match def.next {
                Next::To(step) => step,
                Next::YesNo { no, .. } => no,
            };
            advance(flow, session, update, next)
        }

        Verdict::Answer(yes) => {
            let next = match def.next {
                Next::YesNo { yes: y, no: n } => {
                    if yes {
                        y
                    } else {
                        n
                    }
                }
                Next::To(step) => step,
            };
            advance(flow, session, SessionUpdate::default(), next)
        }
    }
}

fn step_def(flow: &Flow, step: Step) -> Result<&'static StepDef, TransitionError> {
    flow.step(step).ok_or(TransitionError::UnknownStep {
        flow: flow.name,
        step,
    })
}

fn write_field(def: &StepDef, session: &Session, value: FieldValue) -> SessionUpdate {
    match def.write {
        Write::Nothing => SessionUpdate::default(),
        Write::Set(name) => SessionUpdate::default().with_field(name, value),
        Write::Append(name) => {
            let mut items: Vec<String> = session
                .collected
                .get(name)
                .and_then(FieldValue::as_list)
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            items.push(value.to_string());
            SessionUpdate::default().with_field(name, FieldValue::List(items))
        }
    }
}

fn advance(
    flow: &Flow,
    session: &Session,
    mut update: SessionUpdate,
    next: Step,
) -> Result<TransitionResult, TransitionError> {
    if next.is_terminal() {
        let mut collected = session.collected.clone();
        collected.append(&mut update.fields);
        let completion = completion_text(flow, &collected);
        return Ok(TransitionResult::new().with_effects([
            Effect::Finalize { collected },
            Effect::send_text(completion),
            Effect::DeleteSession,
        ]));
    }

    let next_def = step_def(flow, next)?;
    update.step = Some(next);
    Ok(TransitionResult::new()
        .with_effect(Effect::UpdateSession(update))
        .with_effect(Effect::send(next_def.prompt_message())))
}

/// Completion acknowledgment followed by a summary of what was collected
pub fn completion_text(flow: &Flow, collected: &Collected) -> String {
    let lines: Vec<String> = flow
        .steps
        .iter()
        .filter_map(|def| {
            let value = collected.get(def.write.field()?)?;
            Some(format!("- {}: {value}", def.label))
        })
        .collect();

    if lines.is_empty() {
        flow.completion.to_string()
    } else {
        format!("{}\n\nSummary:\n{}", flow.completion, lines.join("\n"))
    }
}
