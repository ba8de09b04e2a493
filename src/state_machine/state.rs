//! Session state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Steps
// ============================================================================

/// A named node in a flow's transition graph.
///
/// The set is shared by every flow; each flow uses a subset of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AssistanceType,
    Location,
    Contact,
    Urgency,
    People,
    Needs,
    MoreNeeds,
    Notes,
    Image,
    PetName,
    Species,
    LastSeen,
    Description,
    /// Terminal. Only ever observed by finalization, never stored.
    Complete,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::AssistanceType => "assistance_type",
            Step::Location => "location",
            Step::Contact => "contact",
            Step::Urgency => "urgency",
            Step::People => "people",
            Step::Needs => "needs",
            Step::MoreNeeds => "more_needs",
            Step::Notes => "notes",
            Step::Image => "image",
            Step::PetName => "pet_name",
            Step::Species => "species",
            Step::LastSeen => "last_seen",
            Step::Description => "description",
            Step::Complete => "complete",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Complete)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Collected values
// ============================================================================

/// Geographic coordinates shared through a location attachment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub long: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.long)
    }
}

/// A value written into `Session::collected`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
    Location(GeoPoint),
}

impl FieldValue {
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(", ")),
            FieldValue::Location(point) => write!(f, "{point}"),
        }
    }
}

/// Field name -> value, ordered for stable summaries and reports
pub type Collected = BTreeMap<String, FieldValue>;

// ============================================================================
// Session
// ============================================================================

/// Per-sender conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub sender_id: String,
    pub current_step: Step,
    pub collected: Collected,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(sender_id: impl Into<String>, entry: Step, now: DateTime<Utc>) -> Self {
        Self {
            sender_id: sender_id.into(),
            current_step: entry,
            collected: Collected::new(),
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Whether the session has been idle for longer than `max_idle` at `now`
    pub fn is_idle(&self, now: DateTime<Utc>, max_idle: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity_at) > max_idle
    }
}

/// Partial update merged into a session by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub step: Option<Step>,
    pub fields: Collected,
}

impl SessionUpdate {
    #[cfg(test)]
    pub fn advance(step: Step) -> Self {
        Self {
            step: Some(step),
            fields: Collected::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}
