//! HTTP endpoints: health, webhook verification handshake, and message delivery.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::payload::extract_text_messages;
use crate::relay::Relay;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

/// Build the Axum router for the relay.
pub fn relay_routes(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(AppState { relay })
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

// ── Verification handshake ──────────────────────────────────────────────

/// Query parameters of the provider's subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let expected = &state.relay.config().verify_token;
    // An unset token never verifies, even against an empty `hub.verify_token`.
    let subscribed = params.mode.as_deref() == Some("subscribe")
        && !expected.is_empty()
        && params.verify_token.as_deref() == Some(expected.as_str());

    let challenge = params
        .challenge
        .as_deref()
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<i64>().ok());

    match (subscribed, challenge) {
        (true, Some(challenge)) => {
            info!("Webhook verified");
            (StatusCode::OK, Json(challenge)).into_response()
        }
        _ => {
            warn!(mode = ?params.mode, "Webhook verification failed");
            (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "Verification failed" })),
            )
                .into_response()
        }
    }
}

// ── Message delivery ────────────────────────────────────────────────────

async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let messages = extract_text_messages(&body);
    if messages.is_empty() {
        debug!("Webhook carried no text messages");
        return Json(serde_json::json!({ "status": "ignored" }));
    }

    info!(count = messages.len(), "Processing inbound text messages");
    // Failures were already logged per message; the acknowledgement stays "ok".
    let batch = state.relay.process(&messages).await;
    info!(
        processed = batch.len(),
        sent = batch.sent(),
        failed = batch.failed(),
        "Webhook batch processed"
    );

    Json(serde_json::json!({ "status": "ok" }))
}
