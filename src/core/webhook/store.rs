use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::now_millis;

/// Number of webhook events retained.
pub const WEBHOOK_CAPACITY: usize = 200;

/// Default page size of [`WebhookStore::list`].
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Body of a received webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Json(Value),
    Text(String),
}

impl WebhookPayload {
    /// Parse `body` as JSON, falling back to lossy text.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => WebhookPayload::Json(value),
            Err(_) => WebhookPayload::Text(String::from_utf8_lossy(body).into_owned()),
        }
    }

    /// Platform event type, from `message.type` or a top-level `type`.
    pub fn event_type(&self) -> Option<&str> {
        let WebhookPayload::Json(value) = self else {
            return None;
        };
        value
            .get("message")
            .and_then(|m| m.get("type"))
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
    }
}

/// One inbound webhook notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    /// Unix epoch milliseconds
    pub received_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    pub payload: WebhookPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size_bytes: usize,
    /// `None` when no secret is configured
    pub verified: Option<bool>,
}

impl WebhookEvent {
    pub fn new(body: &Bytes, content_type: Option<String>, verified: Option<bool>) -> Self {
        let payload = WebhookPayload::from_body(body);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            received_at: now_millis(),
            event_type: payload.event_type().map(str::to_string),
            payload,
            content_type,
            size_bytes: body.len(),
            verified,
        }
    }
}

/// Ring buffer of the most recent webhook events, newest first.
pub struct WebhookStore {
    capacity: usize,
    events: RwLock<VecDeque<WebhookEvent>>,
}

impl WebhookStore {
    pub fn new() -> Self {
        Self::with_capacity(WEBHOOK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Store an event, evicting the oldest when full.
    pub fn push(&self, event: WebhookEvent) {
        let mut events = self.events.write();
        events.push_front(event);
        events.truncate(self.capacity);
    }

    /// Newest-first events received after `since` (epoch ms), at most
    /// `limit` (clamped to the capacity).
    pub fn list(&self, since: Option<u64>, limit: Option<usize>) -> Vec<WebhookEvent> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).min(self.capacity);
        self.events
            .read()
            .iter()
            .filter(|e| since.is_none_or(|since| e.received_at > since))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<WebhookEvent> {
        self.events.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove everything; returns how many events were dropped.
    pub fn clear(&self) -> usize {
        let mut events = self.events.write();
        let count = events.len();
        events.clear();
        count
    }
}

impl Default for WebhookStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(body: &str) -> WebhookEvent {
        WebhookEvent::new(
            &Bytes::copy_from_slice(body.as_bytes()),
            Some("application/json".into()),
            None,
        )
    }

    #[test]
    fn test_ring_buffer_bound_and_order() {
        let store = WebhookStore::new();
        for i in 0..(WEBHOOK_CAPACITY + 25) {
            store.push(event(&format!(r#"{{"n":{i}}}"#)));
            assert!(store.len() <= WEBHOOK_CAPACITY);
        }

        let events = store.list(None, Some(usize::MAX));
        assert_eq!(events.len(), WEBHOOK_CAPACITY);
        assert_eq!(
            events[0].payload,
            WebhookPayload::Json(serde_json::json!({"n": WEBHOOK_CAPACITY + 24}))
        );
        assert_eq!(
            events.last().unwrap().payload,
            WebhookPayload::Json(serde_json::json!({"n": 25}))
        );
    }

    #[test]
    fn test_default_limit_and_since() {
        let store = WebhookStore::new();
        for _ in 0..60 {
            store.push(event("{}"));
        }
        assert_eq!(store.list(None, None).len(), DEFAULT_LIST_LIMIT);

        let newest = store.list(None, Some(1))[0].received_at;
        assert!(store.list(Some(newest), None).is_empty());
    }

    #[test]
    fn test_text_payload_and_event_type() {
        let plain = event("hello");
        assert_eq!(plain.payload, WebhookPayload::Text("hello".into()));
        assert!(plain.event_type.is_none());

        let typed = event(r#"{"message":{"type":"end-of-call-report"}}"#);
        assert_eq!(typed.event_type.as_deref(), Some("end-of-call-report"));
        assert_eq!(typed.size_bytes, 41);
    }

    #[test]
    fn test_clear_and_get() {
        let store = WebhookStore::new();
        let e = event("{}");
        let id = e.id.clone();
        store.push(e);
        assert!(store.get(&id).is_some());
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_verified_serializes_as_null_when_unknown() {
        let json = serde_json::to_value(event("{}")).unwrap();
        assert!(json["verified"].is_null());
        assert!(json.get("receivedAt").is_some());
    }
}
