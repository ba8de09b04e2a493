//! HTTP surface of the bot
//!
//! Webhook verification and delivery, plus health and version probes.

mod events;
mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::ProductionEngine;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProductionEngine>,
    pub verify_token: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<ProductionEngine>, verify_token: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            verify_token: verify_token.into(),
        }
    }
}
