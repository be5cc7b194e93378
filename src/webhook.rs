//! Webhook receiver: the platform's verification handshake plus the event
//! feed. Inbound bodies are archived raw, then parsed into events and queued
//! for the engine; the 200 goes back before any event is processed.

use crate::db::Db;
use crate::event::{parse_webhook, Event};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub verify_token: String,
    pub events_tx: mpsc::UnboundedSender<Event>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_handler).post(receive_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the HTTP server and hand received events to the engine via the
/// channel inside `state`.
pub async fn start_server(bind: &str, port: u16, state: AppState) -> Result<(), anyhow::Error> {
    let addr = format!("{}:{}", bind, port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Webhook listening on http://{}/webhook", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The subscription handshake: echo `hub.challenge` back when the verify
/// token matches.
async fn verify_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").map(String::as_str);
    match (token, challenge) {
        (Some(token), Some(challenge)) if token == state.verify_token => {
            challenge.to_string().into_response()
        }
        _ => {
            tracing::warn!("Webhook verification failed");
            (StatusCode::FORBIDDEN, "Error, wrong validation token").into_response()
        }
    }
}

async fn receive_handler(State(state): State<AppState>, body: String) -> Response {
    // Archive first; a failure here must not cost us the events.
    if let Err(e) = state.db.raw_events_insert(&body).await {
        tracing::error!("Failed to archive webhook body: {}", e);
    }

    let parsed: Value = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Rejected non-JSON webhook body: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid body").into_response();
        }
    };

    for event in parse_webhook(&parsed) {
        if state.events_tx.send(event).is_err() {
            tracing::error!("Event queue closed, dropping webhook events");
            break;
        }
    }
    Json(json!({ "status": "ok" })).into_response()
}
