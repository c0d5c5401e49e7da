//! Request and response bodies of the platform REST API.
//!
//! Every resource keeps unknown fields in `extra` so dashboard clients see
//! the full document even when the platform adds fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::{PlatformError, PlatformResult};

// =============================================================================
// Phone Numbers
// =============================================================================

/// A phone number registered on the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// e.g. "byo-phone-number", "twilio", "vapi"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// SIP trunk credential used for BYO numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /phone-number`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhoneNumberRequest {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    /// Skip E.164 validation for SIP URIs and extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_e164_check_enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Credentials
// =============================================================================

/// A SIP trunk (or other provider) credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<SipGateway>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A SIP gateway entry of a trunk credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SipGateway {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /credential`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialRequest {
    /// e.g. "byo-sip-trunk"
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<SipGateway>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Assistants
// =============================================================================

/// A configured voice assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_plan: Option<MonitorPlan>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which realtime endpoints the platform issues for calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPlan {
    #[serde(default)]
    pub listen_enabled: bool,
    #[serde(default)]
    pub control_enabled: bool,
}

impl MonitorPlan {
    pub fn enabled() -> Self {
        Self {
            listen_enabled: true,
            control_enabled: true,
        }
    }
}

// =============================================================================
// Calls
// =============================================================================

/// Call document returned by `POST /call` and `GET /call/{id}`.
///
/// Status-update events carry partial documents, so every field except the
/// id is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<CallMonitorUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Call {
    /// Listen endpoint, if the platform issued one.
    pub fn listen_url(&self) -> Option<&str> {
        self.monitor
            .as_ref()
            .and_then(|m| m.listen_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Control endpoint, if the platform issued one.
    pub fn control_url(&self) -> Option<&str> {
        self.monitor
            .as_ref()
            .and_then(|m| m.control_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Transcript from the top level or from `artifact.transcript`.
    pub fn any_transcript(&self) -> Option<String> {
        self.transcript.clone().or_else(|| {
            self.extra
                .get("artifact")
                .and_then(|a| a.get("transcript"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

/// The called party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Realtime endpoints issued for a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMonitorUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_url: Option<String>,
}

/// Body of `POST /call`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    #[serde(default)]
    pub assistant_id: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateCallRequest {
    pub fn new(
        assistant_id: impl Into<String>,
        phone_number_id: impl Into<String>,
        customer_number: impl Into<String>,
    ) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            phone_number_id: phone_number_id.into(),
            customer: Customer {
                number: Some(customer_number.into()),
                name: None,
            },
            name: None,
            extra: Map::new(),
        }
    }

    /// Set the customer display name.
    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer.name = Some(name.into());
        self
    }

    /// Check the fields the platform requires to place a call.
    pub fn validate(&self) -> PlatformResult<()> {
        let mut missing = Vec::new();
        if self.assistant_id.trim().is_empty() {
            missing.push("assistantId");
        }
        if self.phone_number_id.trim().is_empty() {
            missing.push("phoneNumberId");
        }
        if self
            .customer
            .number
            .as_deref()
            .is_none_or(|n| n.trim().is_empty())
        {
            missing.push("customer.number");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::InvalidRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_keeps_unknown_fields() {
        let call: Call = serde_json::from_value(json!({
            "id": "call-1",
            "status": "queued",
            "monitor": {"listenUrl": "wss://example.test/listen", "controlUrl": "https://example.test/control"},
            "orgId": "org-9",
            "artifact": {"transcript": "AI: hello"}
        }))
        .unwrap();

        assert_eq!(call.listen_url(), Some("wss://example.test/listen"));
        assert_eq!(call.control_url(), Some("https://example.test/control"));
        assert_eq!(call.extra["orgId"], "org-9");
        assert_eq!(call.any_transcript().as_deref(), Some("AI: hello"));

        let back = serde_json::to_value(&call).unwrap();
        assert_eq!(back["orgId"], "org-9");
        assert_eq!(back["monitor"]["listenUrl"], "wss://example.test/listen");
    }

    #[test]
    fn test_empty_listen_url_is_absent() {
        let call: Call =
            serde_json::from_value(json!({"id": "c", "monitor": {"listenUrl": ""}})).unwrap();
        assert_eq!(call.listen_url(), None);
    }

    #[test]
    fn test_create_call_validation() {
        let ok = CreateCallRequest::new("asst", "pn", "+15550100");
        assert!(ok.validate().is_ok());

        let missing = CreateCallRequest::new("", "pn", " ");
        match missing.validate() {
            Err(PlatformError::InvalidRequest(msg)) => {
                assert!(msg.contains("assistantId"));
                assert!(msg.contains("customer.number"));
                assert!(!msg.contains("phoneNumberId"));
            }
            other => panic!("Expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_create_call_serializes_camel_case() {
        let req = CreateCallRequest::new("asst", "pn", "+15550100").with_customer_name("Ada");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["assistantId"], "asst");
        assert_eq!(body["phoneNumberId"], "pn");
        assert_eq!(body["customer"]["name"], "Ada");
        assert!(body.get("name").is_none());
    }
}
