//! Runtime for executing conversations
//!
//! The engine is generic over its I/O so tests can swap in mocks.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationEngine;
pub use traits::*;

use std::sync::Arc;

/// Type alias for the production engine with boxed collaborators
pub type ProductionEngine = ConversationEngine<Arc<dyn MessageSender>, Arc<dyn ReportSink>>;
