//! Inbound webhook receiver and webhook log

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, header},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::webhook::{WebhookEvent, verify_signature};
use crate::state::AppState;

/// Acknowledgement returned to the platform
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub id: String,
    pub verified: Option<bool>,
}

/// Receive a platform webhook.
///
/// Every delivery is accepted. When a secret is configured the signature
/// header is checked and the outcome recorded on the event.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let verified = state.config.webhook_secret.as_deref().map(|secret| {
        let signature = headers
            .get(state.config.webhook_signature_header.as_str())
            .and_then(|v| v.to_str().ok());
        match verify_signature(secret, &body, signature) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Webhook signature verification failed");
                false
            }
        }
    });

    let event = WebhookEvent::new(&body, content_type, verified);
    info!(
        id = %event.id,
        event_type = event.event_type.as_deref().unwrap_or("unknown"),
        size_bytes = event.size_bytes,
        verified = ?verified,
        "Webhook received"
    );

    let ack = WebhookAck {
        received: true,
        id: event.id.clone(),
        verified,
    };
    state.webhooks.push(event);
    Json(ack)
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookListQuery {
    /// Only events received after this epoch millisecond
    pub since: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct WebhookListResponse {
    pub events: Vec<WebhookEvent>,
    pub count: usize,
    pub total: usize,
}

pub async fn list_webhooks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookListQuery>,
) -> Json<WebhookListResponse> {
    let events = state.webhooks.list(query.since, query.limit);
    Json(WebhookListResponse {
        count: events.len(),
        total: state.webhooks.len(),
        events,
    })
}

pub async fn clear_webhooks(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cleared = state.webhooks.clear();
    debug!(cleared, "Webhook log cleared");
    Json(serde_json::json!({ "cleared": cleared }))
}
