//! Current call session state.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::platform::Call;
use crate::utils::now_millis;

/// Progress of a call as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallStatus {
    #[default]
    Queued,
    Ringing,
    InProgress,
    Forwarding,
    Ended,
    Failed,
    /// Any value this build does not know, kept verbatim
    Other(String),
}

impl CallStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => CallStatus::Queued,
            "ringing" => CallStatus::Ringing,
            "in-progress" | "in_progress" => CallStatus::InProgress,
            "forwarding" => CallStatus::Forwarding,
            "ended" => CallStatus::Ended,
            "failed" => CallStatus::Failed,
            _ => CallStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Forwarding => "forwarding",
            CallStatus::Ended => "ended",
            CallStatus::Failed => "failed",
            CallStatus::Other(raw) => raw,
        }
    }

    /// Whether the call can no longer change.
    ///
    /// `completed` is not a platform status but some integrations report it.
    pub fn is_terminal(&self) -> bool {
        match self {
            CallStatus::Ended | CallStatus::Failed => true,
            CallStatus::Other(raw) => raw.eq_ignore_ascii_case("completed"),
            _ => false,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CallStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CallStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(CallStatus::parse(&raw))
    }
}

/// The call currently shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub id: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_reason: Option<String>,
    /// Unix epoch milliseconds of the last applied update
    pub updated_at: u64,
}

impl CallSession {
    pub fn from_call(call: &Call) -> Self {
        let mut session = Self {
            id: call.id.clone(),
            status: CallStatus::default(),
            customer_number: None,
            customer_name: None,
            assistant_id: None,
            phone_number_id: None,
            listen_url: None,
            control_url: None,
            cost: None,
            transcript: None,
            ended_reason: None,
            updated_at: now_millis(),
        };
        session.merge_call(call);
        session
    }

    /// Overwrite the fields present in `call`; absent fields are kept.
    pub fn merge_call(&mut self, call: &Call) {
        if let Some(status) = &call.status {
            self.status = CallStatus::parse(status);
        }
        if let Some(customer) = &call.customer {
            if customer.number.is_some() {
                self.customer_number = customer.number.clone();
            }
            if customer.name.is_some() {
                self.customer_name = customer.name.clone();
            }
        }
        if call.assistant_id.is_some() {
            self.assistant_id = call.assistant_id.clone();
        }
        if call.phone_number_id.is_some() {
            self.phone_number_id = call.phone_number_id.clone();
        }
        if let Some(url) = call.listen_url() {
            self.listen_url = Some(url.to_string());
        }
        if let Some(url) = call.control_url() {
            self.control_url = Some(url.to_string());
        }
        if call.cost.is_some() {
            self.cost = call.cost;
        }
        if let Some(transcript) = call.any_transcript() {
            self.transcript = Some(transcript);
        }
        if call.ended_reason.is_some() {
            self.ended_reason = call.ended_reason.clone();
        }
        self.updated_at = now_millis();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Shared holder of the current [`CallSession`].
///
/// Cloning is cheap; clones observe the same session.
#[derive(Clone, Default)]
pub struct SessionTracker {
    current: Arc<RwLock<Option<CallSession>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current session.
    pub fn start(&self, session: CallSession) {
        *self.current.write() = Some(session);
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }

    pub fn snapshot(&self) -> Option<CallSession> {
        self.current.read().clone()
    }

    pub fn call_id(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.id.clone())
    }

    /// Merge a call document into the session.
    ///
    /// Documents for a different call id are ignored; documents without an
    /// id apply to the current session. Returns the updated snapshot.
    pub fn apply_call(&self, call: &Call) -> Option<CallSession> {
        let mut current = self.current.write();
        let session = current.as_mut()?;
        if !call.id.is_empty() && call.id != session.id {
            return None;
        }
        session.merge_call(call);
        Some(session.clone())
    }

    /// Set the status alone.
    pub fn apply_status(&self, status: &str) -> Option<CallSession> {
        let mut current = self.current.write();
        let session = current.as_mut()?;
        session.status = CallStatus::parse(status);
        session.updated_at = now_millis();
        Some(session.clone())
    }

    /// Apply a realtime event of the platform to the session.
    ///
    /// Handles `status-update` (nested `call` object or top-level `status`)
    /// and `end-of-call-report`. Other event types leave the session
    /// untouched and return `None`.
    pub fn apply_event(&self, event: &Value) -> Option<CallSession> {
        match event.get("type").and_then(Value::as_str)? {
            "status-update" => {
                if let Some(call) = event.get("call").filter(|c| c.is_object()) {
                    let call: Call = serde_json::from_value(call.clone()).ok()?;
                    let updated = self.apply_call(&call);
                    // status at the top level wins over the embedded call
                    return match event.get("status").and_then(Value::as_str) {
                        Some(status) if updated.is_some() => self.apply_status(status),
                        _ => updated,
                    };
                }
                let status = event.get("status").and_then(Value::as_str)?;
                self.apply_status(status)
            }
            "end-of-call-report" => {
                let mut report: Call = serde_json::from_value(event.clone()).ok()?;
                if report.status.is_none() {
                    report.status = Some(CallStatus::Ended.as_str().to_string());
                }
                // the report's own fields carry no call id
                report.id = String::new();
                if let Some(call_id) = event
                    .get("call")
                    .and_then(|c| c.get("id"))
                    .and_then(Value::as_str)
                {
                    report.id = call_id.to_string();
                }
                self.apply_call(&report)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(value: Value) -> Call {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(CallStatus::parse("in-progress"), CallStatus::InProgress);
        assert_eq!(CallStatus::parse("RINGING"), CallStatus::Ringing);
        assert_eq!(
            CallStatus::parse("voicemail"),
            CallStatus::Other("voicemail".to_string())
        );
        assert_eq!(CallStatus::parse("voicemail").as_str(), "voicemail");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(CallStatus::Ended.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(CallStatus::parse("completed").is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
        assert!(!CallStatus::parse("voicemail").is_terminal());
    }

    #[test]
    fn test_status_serde_roundtrip_passes_unknown_through() {
        let json = serde_json::to_value(CallStatus::Other("transferring".into())).unwrap();
        assert_eq!(json, "transferring");
        let back: CallStatus = serde_json::from_value(json!("in-progress")).unwrap();
        assert_eq!(back, CallStatus::InProgress);
    }

    #[test]
    fn test_session_from_call() {
        let session = CallSession::from_call(&call(json!({
            "id": "call-1",
            "status": "queued",
            "customer": {"number": "+15550100", "name": "Ada"},
            "monitor": {"listenUrl": "wss://m.example.test/listen"}
        })));

        assert_eq!(session.id, "call-1");
        assert_eq!(session.status, CallStatus::Queued);
        assert_eq!(session.customer_name.as_deref(), Some("Ada"));
        assert_eq!(
            session.listen_url.as_deref(),
            Some("wss://m.example.test/listen")
        );
        assert!(session.cost.is_none());
    }

    #[test]
    fn test_partial_merge_keeps_existing_fields() {
        let tracker = SessionTracker::new();
        tracker.start(CallSession::from_call(&call(json!({
            "id": "call-1",
            "status": "queued",
            "customer": {"number": "+15550100"}
        }))));

        let updated = tracker
            .apply_call(&call(json!({"id": "call-1", "status": "ended", "cost": 0.12, "endedReason": "customer-ended-call"})))
            .unwrap();

        assert_eq!(updated.status, CallStatus::Ended);
        assert_eq!(updated.customer_number.as_deref(), Some("+15550100"));
        assert_eq!(updated.cost, Some(0.12));
        assert_eq!(updated.ended_reason.as_deref(), Some("customer-ended-call"));
    }

    #[test]
    fn test_foreign_call_is_ignored() {
        let tracker = SessionTracker::new();
        tracker.start(CallSession::from_call(&call(json!({"id": "call-1"}))));
        assert!(tracker.apply_call(&call(json!({"id": "call-2", "status": "ended"}))).is_none());
        assert_eq!(tracker.snapshot().unwrap().status, CallStatus::Queued);
    }

    #[test]
    fn test_status_update_event_with_nested_call() {
        let tracker = SessionTracker::new();
        tracker.start(CallSession::from_call(&call(json!({"id": "call-1"}))));

        let updated = tracker
            .apply_event(&json!({
                "type": "status-update",
                "call": {"id": "call-1", "status": "ringing", "phoneNumberId": "pn-1"}
            }))
            .unwrap();
        assert_eq!(updated.status, CallStatus::Ringing);
        assert_eq!(updated.phone_number_id.as_deref(), Some("pn-1"));

        let updated = tracker
            .apply_event(&json!({"type": "status-update", "status": "in-progress"}))
            .unwrap();
        assert_eq!(updated.status, CallStatus::InProgress);
    }

    #[test]
    fn test_end_of_call_report() {
        let tracker = SessionTracker::new();
        tracker.start(CallSession::from_call(&call(json!({"id": "call-1", "status": "in-progress"}))));

        let updated = tracker
            .apply_event(&json!({
                "type": "end-of-call-report",
                "endedReason": "assistant-ended-call",
                "cost": 0.31,
                "artifact": {"transcript": "AI: bye"}
            }))
            .unwrap();
        assert_eq!(updated.status, CallStatus::Ended);
        assert_eq!(updated.transcript.as_deref(), Some("AI: bye"));
        assert_eq!(updated.cost, Some(0.31));
    }

    #[test]
    fn test_unrelated_events_do_not_touch_session() {
        let tracker = SessionTracker::new();
        tracker.start(CallSession::from_call(&call(json!({"id": "call-1"}))));
        assert!(tracker.apply_event(&json!({"type": "transcript", "transcript": "hi"})).is_none());
        assert!(tracker.apply_event(&json!({"no": "type"})).is_none());
    }

    #[test]
    fn test_no_session_means_no_update() {
        let tracker = SessionTracker::new();
        assert!(tracker.apply_status("ended").is_none());
        assert!(tracker.call_id().is_none());
    }
}
