//! Conversation state machine
//!
//! Step tables are data; `transition` is a small interpreter over them that
//! returns effects instead of performing I/O.

mod effect;
pub mod event;
pub mod flow;
pub mod state;
pub(crate) mod transition;
pub mod validate;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Attachment, Input};
pub use flow::{Flow, FlowKind};
pub use state::{Collected, GeoPoint, Session, SessionUpdate, Step};
pub use transition::transition;
