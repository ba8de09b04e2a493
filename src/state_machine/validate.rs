//! Input validation and keyword matching
//!
//! Matching is exact after normalization (trim, lowercase, trailing
//! punctuation dropped). "can you help me" is plain text, not a start command.

use super::event::{Attachment, Input};
use super::flow::{Choice, Rule, StepDef, NO_PAYLOAD, SKIP_PAYLOAD, YES_PAYLOAD};
use super::state::FieldValue;
use regex::Regex;
use std::sync::LazyLock;

const CANCEL_WORDS: &[&str] = &["cancel", "stop", "reset", "quit"];
const CANCEL_PAYLOADS: &[&str] = &["CANCEL"];
const START_WORDS: &[&str] = &["help", "start", "hi", "hello", "get started"];
const START_PAYLOADS: &[&str] = &["GET_STARTED", "START"];
const SKIP_WORDS: &[&str] = &["skip", "done"];
const YES_WORDS: &[&str] = &["yes", "y", "yeah", "yep"];
const NO_WORDS: &[&str] = &["no", "n", "nope"];

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern is valid"));

/// Result of checking an input against a step
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept(FieldValue),
    /// Answer to a yes/no step
    Answer(bool),
    Skip,
    Reject(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Invalid,
    /// An attachment kind this step does not take
    WrongAttachment,
    /// Skip keyword on a required step
    Required,
}

pub fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase()
}

fn matches_keyword(input: &Input, words: &[&str], payloads: &[&str]) -> bool {
    match input {
        Input::Text(text) => {
            let norm = normalize(text);
            words.iter().any(|w| *w == norm)
        }
        Input::QuickReply(payload) => payloads.iter().any(|p| p.eq_ignore_ascii_case(payload)),
        Input::Attachment(_) => false,
    }
}

pub fn is_cancel(input: &Input) -> bool {
    matches_keyword(input, CANCEL_WORDS, CANCEL_PAYLOADS)
}

pub fn is_start(input: &Input) -> bool {
    matches_keyword(input, START_WORDS, START_PAYLOADS)
}

pub fn is_skip(input: &Input) -> bool {
    matches_keyword(input, SKIP_WORDS, &[SKIP_PAYLOAD])
}

/// Strip common separators and check the digit-count/prefix pattern
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    PHONE.is_match(&cleaned).then_some(cleaned)
}

fn free_text(text: &str, min_len: usize) -> Verdict {
    let trimmed = text.trim();
    if trimmed.chars().count() >= min_len {
        Verdict::Accept(FieldValue::Text(trimmed.to_string()))
    } else {
        Verdict::Reject(Rejection::Invalid)
    }
}

fn count(text: &str) -> Verdict {
    match text.trim().parse::<i64>() {
        Ok(n) if n > 0 => Verdict::Accept(FieldValue::Number(n)),
        _ => Verdict::Reject(Rejection::Invalid),
    }
}

fn choice(input: &Input, choices: &[Choice]) -> Verdict {
    let found = match input {
        Input::QuickReply(payload) => choices
            .iter()
            .find(|c| c.payload.eq_ignore_ascii_case(payload.trim())),
        Input::Text(text) => {
            let norm = normalize(text);
            choices.iter().find(|c| {
                c.value.eq_ignore_ascii_case(&norm)
                    || c.title.to_lowercase() == norm
                    || c.payload.eq_ignore_ascii_case(&norm)
                    || c.aliases.iter().any(|a| *a == norm)
            })
        }
        Input::Attachment(_) => return Verdict::Reject(Rejection::WrongAttachment),
    };
    found.map_or(Verdict::Reject(Rejection::Invalid), |c| {
        Verdict::Accept(FieldValue::Text(c.value.to_string()))
    })
}

fn yes_no(input: &Input) -> Verdict {
    if matches_keyword(input, YES_WORDS, &[YES_PAYLOAD]) {
        Verdict::Answer(true)
    } else if matches_keyword(input, NO_WORDS, &[NO_PAYLOAD]) {
        Verdict::Answer(false)
    } else if matches!(input, Input::Attachment(_)) {
        Verdict::Reject(Rejection::WrongAttachment)
    } else {
        Verdict::Reject(Rejection::Invalid)
    }
}

/// Check `input` against the rule of `def`
///
/// The skip keyword is handled first: optional steps always accept it,
/// required steps always reject it.
pub fn validate(def: &StepDef, input: &Input) -> Verdict {
    if is_skip(input) {
        return if def.is_optional() {
            Verdict::Skip
        } else {
            Verdict::Reject(Rejection::Required)
        };
    }

    match (def.rule, input) {
        (Rule::Choice(choices), _) => choice(input, choices),
        (Rule::YesNo, _) => yes_no(input),

        (rule, Input::Attachment(Attachment::Location(point))) if rule.accepts_location() => {
            Verdict::Accept(FieldValue::Location(*point))
        }
        (rule, Input::Attachment(Attachment::Image { url })) if rule.accepts_image() => {
            Verdict::Accept(FieldValue::Text(url.clone()))
        }
        (_, Input::Attachment(_)) => Verdict::Reject(Rejection::WrongAttachment),

        (Rule::FreeText { min_len } | Rule::Place { min_len }, Input::Text(text)) => {
            free_text(text, min_len)
        }
        (Rule::Count, Input::Text(text)) => count(text),
        // The platform's phone quick reply delivers the number as its payload
        (Rule::Phone, Input::Text(raw) | Input::QuickReply(raw)) => normalize_phone(raw)
            .map_or(Verdict::Reject(Rejection::Invalid), |phone| {
                Verdict::Accept(FieldValue::Text(phone))
            }),

        (_, Input::Text(_) | Input::QuickReply(_)) => Verdict::Reject(Rejection::Invalid),
    }
}
