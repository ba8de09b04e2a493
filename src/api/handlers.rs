//! HTTP request handlers

use super::events::{collect_events, InboundEvent};
use super::types::{ErrorResponse, HealthResponse, VerifyParams, WebhookPayload};
use super::AppState;
use crate::runtime::ProductionEngine;
use crate::state_machine::Input;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

/// Subscription handshake: echo the challenge if the token matches
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String, AppError> {
    let VerifyParams {
        mode,
        verify_token,
        challenge,
    } = params;

    match (mode.as_deref(), verify_token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if *token == *state.verify_token => {
            tracing::info!("Webhook verified");
            Ok(challenge)
        }
        (mode, ..) => {
            tracing::warn!(mode = ?mode, "Webhook verification rejected");
            Err(AppError::Forbidden("Verification failed".to_string()))
        }
    }
}

/// Acknowledge a delivery and process its events in the background
async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<&'static str, AppError> {
    if payload.object != "page" {
        return Err(AppError::NotFound(format!(
            "Unsupported object type '{}'",
            payload.object
        )));
    }

    let events = collect_events(payload);
    if !events.is_empty() {
        let engine = Arc::clone(&state.engine);
        tokio::spawn(async move {
            process_batch(&engine, events).await;
        });
    }

    Ok("EVENT_RECEIVED")
}

/// Run a batch through the engine
///
/// Events are grouped by sender. Each sender's events run in arrival order;
/// different senders run concurrently.
pub async fn process_batch(engine: &ProductionEngine, events: Vec<InboundEvent>) {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Input>)> = Vec::new();
    for InboundEvent { sender_id, input } in events {
        let index = *order.entry(sender_id.clone()).or_insert_with(|| {
            groups.push((sender_id, Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(input);
    }

    tracing::debug!(senders = groups.len(), "Processing webhook batch");

    join_all(groups.into_iter().map(|(sender_id, inputs)| async move {
        for input in &inputs {
            engine.handle_input(&sender_id, input).await;
        }
    }))
    .await;
}

// ============================================================
// Probes
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.engine.store().len().await,
        flow: state.engine.flow().name,
    })
}

async fn get_version() -> &'static str {
    concat!("intake-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Forbidden(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
