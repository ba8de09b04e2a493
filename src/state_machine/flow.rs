//! Declarative step tables
//!
//! A flow is an ordered list of step definitions. The first row is the entry
//! step; every other step is reached through `Next` or `Skip` edges, and every
//! path ends in `Step::Complete`.

use super::state::Step;
use crate::messenger::{OutboundMessage, QuickReply};
use std::fmt;
use std::str::FromStr;

pub const SKIP_PAYLOAD: &str = "SKIP";
pub const YES_PAYLOAD: &str = "YES";
pub const NO_PAYLOAD: &str = "NO";

/// One selectable option of an enumerated field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    /// Stored into `collected`
    pub value: &'static str,
    /// Quick-reply button title (max 20 chars on the platform)
    pub title: &'static str,
    pub payload: &'static str,
    /// Extra typed spellings accepted as an exact match
    pub aliases: &'static [&'static str],
}

/// Validation rule applied to a step's raw input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    FreeText { min_len: usize },
    /// Positive integer
    Count,
    Choice(&'static [Choice]),
    Phone,
    /// Free text of at least `min_len` chars, or a shared location
    Place { min_len: usize },
    Image,
    YesNo,
}

impl Rule {
    pub fn accepts_location(self) -> bool {
        matches!(self, Rule::Place { .. })
    }

    pub fn accepts_image(self) -> bool {
        matches!(self, Rule::Image)
    }
}

/// How an accepted value is written into `collected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Nothing,
    Set(&'static str),
    /// Append to a list field, creating it on first use
    Append(&'static str),
}

impl Write {
    pub fn field(self) -> Option<&'static str> {
        match self {
            Write::Nothing => None,
            Write::Set(name) | Write::Append(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    To(Step),
    YesNo { yes: Step, no: Step },
}

/// Whether the skip keyword is accepted, and where it leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Required,
    To(Step),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDef {
    pub step: Step,
    /// Used in the completion summary
    pub label: &'static str,
    pub prompt: &'static str,
    /// Sent before the prompt when validation fails
    pub retry: &'static str,
    pub rule: Rule,
    pub write: Write,
    pub next: Next,
    pub skip: Skip,
}

impl StepDef {
    pub fn is_optional(&self) -> bool {
        matches!(self.skip, Skip::To(_))
    }

    /// Every step this one can lead to
    #[cfg(test)]
    pub fn successors(&self) -> Vec<Step> {
        let mut out = match self.next {
            Next::To(step) => vec![step],
            Next::YesNo { yes, no } => vec![yes, no],
        };
        if let Skip::To(step) = self.skip {
            if !out.contains(&step) {
                out.push(step);
            }
        }
        out
    }

    /// Entry prompt with the quick replies the rule calls for
    pub fn prompt_message(&self) -> OutboundMessage {
        self.message(self.prompt.to_string())
    }

    /// Failure preface followed by the entry prompt
    pub fn retry_message(&self) -> OutboundMessage {
        self.message(format!("{} {}", self.retry, self.prompt))
    }

    fn message(&self, text: String) -> OutboundMessage {
        let mut replies: Vec<QuickReply> = match self.rule {
            Rule::Choice(choices) => choices
                .iter()
                .map(|c| QuickReply::text(c.title, c.payload))
                .collect(),
            Rule::YesNo => vec![
                QuickReply::text("Yes", YES_PAYLOAD),
                QuickReply::text("No", NO_PAYLOAD),
            ],
            Rule::Phone => vec![QuickReply::UserPhoneNumber],
            _ => Vec::new(),
        };
        if self.is_optional() {
            replies.push(QuickReply::text("Skip", SKIP_PAYLOAD));
        }
        OutboundMessage::with_quick_replies(text, replies)
    }
}

/// One intake variant
#[derive(Debug)]
pub struct Flow {
    pub name: &'static str,
    /// Sent to senders without a session
    pub welcome: &'static str,
    pub completion: &'static str,
    pub steps: &'static [StepDef],
}

impl Flow {
    pub fn entry(&self) -> Step {
        self.steps.first().map_or(Step::Complete, |def| def.step)
    }

    pub fn step(&self, step: Step) -> Option<&'static StepDef> {
        self.steps.iter().find(|def| def.step == step)
    }
}

// ============================================================================
// Flow selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowKind {
    #[default]
    Emergency,
    MissingPet,
    Location,
}

impl FlowKind {
    pub fn flow(self) -> &'static Flow {
        match self {
            FlowKind::Emergency => &EMERGENCY,
            FlowKind::MissingPet => &MISSING_PET,
            FlowKind::Location => &LOCATION,
        }
    }

    #[cfg(test)]
    pub fn all() -> [FlowKind; 3] {
        [FlowKind::Emergency, FlowKind::MissingPet, FlowKind::Location]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flow '{0}' (expected emergency, missing_pet or location)")]
pub struct UnknownFlow(pub String);

impl FromStr for FlowKind {
    type Err = UnknownFlow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "emergency" => Ok(FlowKind::Emergency),
            "missing_pet" | "pet" => Ok(FlowKind::MissingPet),
            "location" => Ok(FlowKind::Location),
            _ => Err(UnknownFlow(s.to_string())),
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flow().name)
    }
}

// ============================================================================
// Step tables
// ============================================================================

const ASSISTANCE_TYPES: &[Choice] = &[
    Choice {
        value: "RESCUE",
        title: "Rescue",
        payload: "ASSIST_RESCUE",
        aliases: &["evacuation", "evacuate"],
    },
    Choice {
        value: "MEDICAL",
        title: "Medical",
        payload: "ASSIST_MEDICAL",
        aliases: &["medicine", "doctor", "injury"],
    },
    Choice {
        value: "FOOD_WATER",
        title: "Food & water",
        payload: "ASSIST_FOOD_WATER",
        aliases: &["food", "water", "food and water"],
    },
    Choice {
        value: "SHELTER",
        title: "Shelter",
        payload: "ASSIST_SHELTER",
        aliases: &["housing"],
    },
    Choice {
        value: "OTHER",
        title: "Other",
        payload: "ASSIST_OTHER",
        aliases: &[],
    },
];

const URGENCY_LEVELS: &[Choice] = &[
    Choice {
        value: "CRITICAL",
        title: "Critical",
        payload: "URGENCY_CRITICAL",
        aliases: &[],
    },
    Choice {
        value: "HIGH",
        title: "High",
        payload: "URGENCY_HIGH",
        aliases: &[],
    },
    Choice {
        value: "MEDIUM",
        title: "Medium",
        payload: "URGENCY_MEDIUM",
        aliases: &[],
    },
    Choice {
        value: "LOW",
        title: "Low",
        payload: "URGENCY_LOW",
        aliases: &[],
    },
];

const SPECIES: &[Choice] = &[
    Choice {
        value: "DOG",
        title: "Dog",
        payload: "SPECIES_DOG",
        aliases: &["puppy"],
    },
    Choice {
        value: "CAT",
        title: "Cat",
        payload: "SPECIES_CAT",
        aliases: &["kitten"],
    },
    Choice {
        value: "BIRD",
        title: "Bird",
        payload: "SPECIES_BIRD",
        aliases: &[],
    },
    Choice {
        value: "OTHER",
        title: "Other",
        payload: "SPECIES_OTHER",
        aliases: &[],
    },
];

const CONTACT_STEP: StepDef = StepDef {
    step: Step::Contact,
    label: "Phone",
    prompt: "What phone number can we reach you on?",
    retry: "That doesn't look like a phone number.",
    rule: Rule::Phone,
    write: Write::Set("contactPhone"),
    next: Next::To(Step::Urgency),
    skip: Skip::Required,
};

pub static EMERGENCY: Flow = Flow {
    name: "emergency",
    welcome: "Hi! I can log a request for emergency assistance. Type \"help\" to start, or \"cancel\" at any time to stop.",
    completion: "Thank you. Your request has been recorded and shared with the response team. Stay safe.",
    steps: &[
        StepDef {
            step: Step::AssistanceType,
            label: "Type of help",
            prompt: "What kind of help do you need?",
            retry: "Please choose one of the options.",
            rule: Rule::Choice(ASSISTANCE_TYPES),
            write: Write::Set("assistanceType"),
            next: Next::To(Step::Location),
            skip: Skip::Required,
        },
        StepDef {
            step: Step::Location,
            label: "Location",
            prompt: "Where are you? Share your location or type an address or landmark.",
            retry: "I need a bit more detail about where you are.",
            rule: Rule::Place { min_len: 3 },
            write: Write::Set("location"),
            next: Next::To(Step::Contact),
            skip: Skip::Required,
        },
        CONTACT_STEP,
        StepDef {
            step: Step::Urgency,
            label: "Urgency",
            prompt: "How urgent is it? Critical means someone's life is in danger right now.",
            retry: "Please pick an urgency level.",
            rule: Rule::Choice(URGENCY_LEVELS),
            write: Write::Set("urgencyLevel"),
            next: Next::To(Step::People),
            skip: Skip::Required,
        },
        StepDef {
            step: Step::People,
            label: "People",
            prompt: "How many people need help, including you?",
            retry: "Please enter a number greater than zero.",
            rule: Rule::Count,
            write: Write::Set("peopleCount"),
            next: Next::To(Step::Needs),
            skip: Skip::Required,
        },
        StepDef {
            step: Step::Needs,
            label: "Needs",
            prompt: "What do you need most? (for example water, medicine, blankets)",
            retry: "Please describe the need in a word or two.",
            rule: Rule::FreeText { min_len: 2 },
            write: Write::Append("needs"),
            next: Next::To(Step::MoreNeeds),
            skip: Skip::To(Step::Notes),
        },
        StepDef {
            step: Step::MoreNeeds,
            label: "More needs",
            prompt: "Do you need anything else?",
            retry: "Please answer yes or no.",
            rule: Rule::YesNo,
            write: Write::Nothing,
            next: Next::YesNo {
                yes: Step::Needs,
                no: Step::Notes,
            },
            skip: Skip::Required,
        },
        StepDef {
            step: Step::Notes,
            label: "Notes",
            prompt: "Is there anything else responders should know?",
            retry: "Please add a little more detail.",
            rule: Rule::FreeText { min_len: 2 },
            write: Write::Set("notes"),
            next: Next::To(Step::Image),
            skip: Skip::To(Step::Image),
        },
        StepDef {
            step: Step::Image,
            label: "Photo",
            prompt: "If it is safe, send a photo of the situation. Otherwise tap Skip to finish.",
            retry: "Please send a photo, or type skip.",
            rule: Rule::Image,
            write: Write::Set("imageUrl"),
            next: Next::To(Step::Complete),
            skip: Skip::To(Step::Complete),
        },
    ],
};

pub static MISSING_PET: Flow = Flow {
    name: "missing_pet",
    welcome: "Hi! I can help you report a missing pet. Type \"help\" to start, or \"cancel\" at any time to stop.",
    completion: "Thank you. Your missing-pet report has been filed. We'll be in touch if there's a sighting.",
    steps: &[
        StepDef {
            step: Step::PetName,
            label: "Pet name",
            prompt: "What is your pet's name?",
            retry: "That name looks too short.",
            rule: Rule::FreeText { min_len: 2 },
            write: Write::Set("petName"),
            next: Next::To(Step::Species),
            skip: Skip::Required,
        },
        StepDef {
            step: Step::Species,
            label: "Species",
            prompt: "What kind of animal is it?",
            retry: "Please choose one of the options.",
            rule: Rule::Choice(SPECIES),
            write: Write::Set("species"),
            next: Next::To(Step::LastSeen),
            skip: Skip::Required,
        },
        StepDef {
            step: Step::LastSeen,
            label: "Last seen",
            prompt: "Where was your pet last seen? Share a location or type an address.",
            retry: "I need a bit more detail about the place.",
            rule: Rule::Place { min_len: 3 },
            write: Write::Set("lastSeen"),
            next: Next::To(Step::Contact),
            skip: Skip::Required,
        },
        StepDef {
            next: Next::To(Step::Description),
            ..CONTACT_STEP
        },
        StepDef {
            step: Step::Description,
            label: "Description",
            prompt: "Describe your pet: breed, colour, collar, anything distinctive.",
            retry: "Please add a little more detail.",
            rule: Rule::FreeText { min_len: 2 },
            write: Write::Set("description"),
            next: Next::To(Step::Image),
            skip: Skip::To(Step::Image),
        },
        StepDef {
            step: Step::Image,
            label: "Photo",
            prompt: "Send a recent photo of your pet, or tap Skip to finish.",
            retry: "Please send a photo, or type skip.",
            rule: Rule::Image,
            write: Write::Set("imageUrl"),
            next: Next::To(Step::Complete),
            skip: Skip::To(Step::Complete),
        },
    ],
};

pub static LOCATION: Flow = Flow {
    name: "location",
    welcome: "Hi! I can record where you are so help can find you. Type \"help\" to start, or \"cancel\" at any time to stop.",
    completion: "Thank you. Your location has been recorded.",
    steps: &[
        StepDef {
            step: Step::Location,
            label: "Location",
            prompt: "Please share your location, or type an address or landmark.",
            retry: "I need a bit more detail about where you are.",
            rule: Rule::Place { min_len: 3 },
            write: Write::Set("location"),
            next: Next::To(Step::Contact),
            skip: Skip::Required,
        },
        StepDef {
            next: Next::To(Step::Notes),
            ..CONTACT_STEP
        },
        StepDef {
            step: Step::Notes,
            label: "Notes",
            prompt: "Anything else we should know?",
            retry: "Please add a little more detail.",
            rule: Rule::FreeText { min_len: 2 },
            write: Write::Set("notes"),
            next: Next::To(Step::Complete),
            skip: Skip::To(Step::Complete),
        },
    ],
};
