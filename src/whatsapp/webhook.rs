//! Webhook endpoints for the WhatsApp Cloud API.
//!
//! `GET /webhook` answers Meta's subscription handshake. `POST /webhook`
//! receives message notifications; every contained entry is handled in
//! delivery order and the response is always `{"status":"ok"}` so the
//! platform does not redeliver.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::ledger::{InboundEvent, MessageRouter};

#[derive(Clone)]
pub struct WebhookState {
    router: Arc<MessageRouter>,
    verify_token: Arc<str>,
}

impl WebhookState {
    pub fn new(router: Arc<MessageRouter>, verify_token: &str) -> Self {
        Self { router, verify_token: Arc::from(verify_token) }
    }
}

pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// The challenge to echo back, if the handshake is valid. An empty
/// configured token never verifies.
pub fn verify_subscription(params: &VerifyParams, expected_token: &str) -> Option<String> {
    if expected_token.is_empty() {
        return None;
    }
    match (&params.mode, &params.verify_token) {
        (Some(mode), Some(token)) if mode == "subscribe" && token == expected_token => {
            Some(params.challenge.clone().unwrap_or_default())
        }
        _ => None,
    }
}

async fn verify(State(state): State<WebhookState>, Query(params): Query<VerifyParams>) -> impl IntoResponse {
    match verify_subscription(&params, &state.verify_token) {
        Some(challenge) => {
            info!("✅ Webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        None => {
            warn!("Webhook verification failed (mode={:?})", params.mode);
            (StatusCode::FORBIDDEN, "Verification failed".to_string())
        }
    }
}

async fn receive(State(state): State<WebhookState>, body: Bytes) -> Json<Value> {
    let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        warn!("Ignoring unparseable webhook body: {e}");
        Value::Null
    });

    for event in parse_payload(&payload) {
        state.router.handle(event).await;
    }

    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    from: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<WaText>,
    #[serde(default)]
    interactive: Option<WaInteractive>,
}

#[derive(Debug, Deserialize)]
struct WaText {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct WaInteractive {
    list_reply: Option<WaReply>,
    button_reply: Option<WaReply>,
}

#[derive(Debug, Deserialize)]
struct WaReply {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
}

/// One event per entry that carries a message, in delivery order.
pub fn parse_payload(payload: &Value) -> Vec<InboundEvent> {
    payload
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_entry).collect())
        .unwrap_or_default()
}

/// The first message of the first change that has one. Status callbacks
/// and entries without a sender yield `None`.
pub fn parse_entry(entry: &Value) -> Option<InboundEvent> {
    let changes = entry.get("changes")?.as_array()?;
    let raw = changes
        .iter()
        .find_map(|change| change.get("value")?.get("messages")?.as_array()?.first())?;

    let message: WaMessage = match serde_json::from_value(raw.clone()) {
        Ok(message) => message,
        Err(e) => {
            warn!("Skipping malformed message: {e}");
            return None;
        }
    };

    let Some(sender) = message.from.filter(|f| !f.is_empty()) else {
        debug!("Skipping message without sender");
        return None;
    };

    match message.kind.as_deref().unwrap_or("text") {
        "interactive" => {
            let reply = message
                .interactive
                .and_then(|i| i.list_reply.or(i.button_reply));
            Some(match reply {
                Some(r) => InboundEvent::selection(sender, r.id.trim(), r.title.trim()),
                None => InboundEvent::text(sender, ""),
            })
        }
        "text" => {
            let body = message.text.map(|t| t.body).unwrap_or_default();
            Some(InboundEvent::text(sender, body.trim()))
        }
        other => {
            debug!("Unsupported message type {other:?} from {sender}");
            Some(InboundEvent::text(sender, ""))
        }
    }
}
