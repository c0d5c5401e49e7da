//! REST client for the voice platform.
//!
//! [`PlatformClient`] issues one request per resource action. Every request
//! is described before dispatch and its outcome is reported to registered
//! [`ApiObserver`]s, so diagnostic views can show the call history without
//! sitting on the request path.
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_dialer::core::platform::{PlatformClient, PlatformConfig, CreateCallRequest};
//!
//! let client = PlatformClient::new(PlatformConfig::new("https://api.vapi.ai", "sk-..."))?;
//! let call = client
//!     .create_call(&CreateCallRequest::new("asst-1", "pn-1", "+15550100"))
//!     .await?;
//! println!("call {} is {:?}", call.id, call.status);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use reqwest::{Client, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::base::{
    ApiCallRecord, ApiRequest, ApiResponse, ObserverId, PlatformError, PlatformResult,
    SharedObserver,
};
use super::config::PlatformConfig;
use super::messages::{
    Assistant, Call, CreateCallRequest, CreateCredentialRequest, CreatePhoneNumberRequest,
    Credential, MonitorPlan, PhoneNumber,
};
use crate::utils::{now_millis, validate_http_url};

/// User-Agent header value for API requests.
const USER_AGENT: &str = concat!("WaaV-Dialer/", env!("CARGO_PKG_VERSION"));

/// Authenticated client for the platform REST API.
///
/// Cloning is cheap; clones share the connection pool and the observer list.
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: Url,
    api_key: Arc<str>,
    observers: Arc<RwLock<Vec<(ObserverId, SharedObserver)>>>,
    next_observer_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url.as_str())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> PlatformResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PlatformError::InvalidConfiguration(
                "platform API key is required".to_string(),
            ));
        }

        let base_url = validate_http_url(config.base_url.trim_end_matches('/')).map_err(|e| {
            PlatformError::InvalidConfiguration(format!(
                "invalid platform base URL '{}': {e}",
                config.base_url
            ))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| PlatformError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: Arc::from(config.api_key.as_str()),
            observers: Arc::new(RwLock::new(Vec::new())),
            next_observer_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    /// Register an observer notified after every request.
    pub fn register_observer(&self, observer: SharedObserver) -> ObserverId {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove a previously registered observer. Returns false if unknown.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    fn notify(&self, record: &ApiCallRecord) {
        // Snapshot so observers may (un)register from inside the callback
        let observers: Vec<SharedObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer.on_api_call(record);
        }
    }

    // -------------------------------------------------------------------------
    // Phone numbers
    // -------------------------------------------------------------------------

    pub async fn list_phone_numbers(&self) -> PlatformResult<Vec<PhoneNumber>> {
        self.send::<(), _>(Method::GET, &["phone-number"], "List phone numbers", None)
            .await
    }

    pub async fn create_phone_number(
        &self,
        request: &CreatePhoneNumberRequest,
    ) -> PlatformResult<PhoneNumber> {
        self.send(
            Method::POST,
            &["phone-number"],
            "Create phone number",
            Some(request),
        )
        .await
    }

    pub async fn update_phone_number(&self, id: &str, patch: &Value) -> PlatformResult<PhoneNumber> {
        self.send(
            Method::PATCH,
            &["phone-number", id],
            "Update phone number",
            Some(patch),
        )
        .await
    }

    pub async fn delete_phone_number(&self, id: &str) -> PlatformResult<Value> {
        self.send::<(), _>(
            Method::DELETE,
            &["phone-number", id],
            "Delete phone number",
            None,
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------

    pub async fn list_credentials(&self) -> PlatformResult<Vec<Credential>> {
        self.send::<(), _>(Method::GET, &["credential"], "List credentials", None)
            .await
    }

    pub async fn get_credential(&self, id: &str) -> PlatformResult<Credential> {
        self.send::<(), _>(Method::GET, &["credential", id], "Fetch credential", None)
            .await
    }

    pub async fn create_credential(
        &self,
        request: &CreateCredentialRequest,
    ) -> PlatformResult<Credential> {
        self.send(
            Method::POST,
            &["credential"],
            "Create SIP trunk credential",
            Some(request),
        )
        .await
    }

    /// Attempt an in-place credential update.
    ///
    /// The platform does not support editing credentials; any failure is
    /// reported as [`PlatformError::UnsupportedOperation`] so callers can
    /// offer delete-and-recreate instead.
    pub async fn update_credential(&self, id: &str, patch: &Value) -> PlatformResult<Credential> {
        let outcome: PlatformResult<Credential> = self
            .send(
                Method::PATCH,
                &["credential", id],
                "Update credential",
                Some(patch),
            )
            .await;

        outcome.map_err(|e| {
            warn!(credential_id = %id, error = %e, "Credential update rejected by platform");
            PlatformError::UnsupportedOperation(format!(
                "credential '{id}' cannot be updated in place ({e}); delete it and create a new credential instead"
            ))
        })
    }

    pub async fn delete_credential(&self, id: &str) -> PlatformResult<Value> {
        self.send::<(), _>(Method::DELETE, &["credential", id], "Delete credential", None)
            .await
    }

    // -------------------------------------------------------------------------
    // Assistants
    // -------------------------------------------------------------------------

    pub async fn list_assistants(&self) -> PlatformResult<Vec<Assistant>> {
        self.send::<(), _>(Method::GET, &["assistant"], "List assistants", None)
            .await
    }

    pub async fn get_assistant(&self, id: &str) -> PlatformResult<Assistant> {
        self.send::<(), _>(Method::GET, &["assistant", id], "Fetch assistant", None)
            .await
    }

    pub async fn create_assistant(&self, assistant: &Value) -> PlatformResult<Assistant> {
        self.send(
            Method::POST,
            &["assistant"],
            "Create assistant",
            Some(assistant),
        )
        .await
    }

    pub async fn update_assistant(&self, id: &str, patch: &Value) -> PlatformResult<Assistant> {
        self.send(
            Method::PATCH,
            &["assistant", id],
            "Update assistant",
            Some(patch),
        )
        .await
    }

    pub async fn delete_assistant(&self, id: &str) -> PlatformResult<Value> {
        self.send::<(), _>(Method::DELETE, &["assistant", id], "Delete assistant", None)
            .await
    }

    /// Turn on listen and control endpoints for calls of an assistant.
    pub async fn enable_monitoring(&self, assistant_id: &str) -> PlatformResult<Assistant> {
        let patch = json!({ "monitorPlan": MonitorPlan::enabled() });
        self.send(
            Method::PATCH,
            &["assistant", assistant_id],
            "Enable call monitoring",
            Some(&patch),
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    /// Place an outbound call.
    ///
    /// Monitoring is enabled on the assistant first so the result carries a
    /// listen endpoint; failure of that step is logged and ignored.
    pub async fn create_call(&self, request: &CreateCallRequest) -> PlatformResult<Call> {
        request.validate()?;

        if let Err(e) = self.enable_monitoring(&request.assistant_id).await {
            warn!(
                assistant_id = %request.assistant_id,
                error = %e,
                "Could not enable monitoring, creating call without it"
            );
        }

        self.send(Method::POST, &["call"], "Create outbound call", Some(request))
            .await
    }

    pub async fn get_call(&self, id: &str) -> PlatformResult<Call> {
        self.send::<(), _>(Method::GET, &["call", id], "Fetch call status", None)
            .await
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    fn endpoint_url(&self, segments: &[&str]) -> PlatformResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PlatformError::InvalidConfiguration(
                    "platform base URL cannot carry a path".to_string(),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Dispatch one request and decode the response into `T`.
    ///
    /// Observers are notified after decoding, so a well-formed reply of the
    /// wrong shape is recorded as a failure.
    async fn send<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        purpose: &str,
        body: Option<&B>,
    ) -> PlatformResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if segments.iter().skip(1).any(|s| s.trim().is_empty()) {
            return Err(PlatformError::InvalidRequest(format!(
                "{purpose}: resource id must not be empty"
            )));
        }

        let url = self.endpoint_url(segments)?;
        let body_value = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| PlatformError::InvalidRequest(e.to_string()))?;

        let request = ApiRequest {
            method: method.to_string(),
            endpoint: format!("/{}", segments.join("/")),
            purpose: purpose.to_string(),
            body: body_value.clone(),
            timestamp_ms: now_millis(),
        };

        debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            purpose = %request.purpose,
            "Platform request"
        );

        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(&*self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(body) = &body_value {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let outcome = Self::dispatch(builder).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (response, result) = match outcome {
            Ok((status, value)) => {
                let result = decode::<T>(value.clone());
                (Some(ApiResponse { status, body: value }), result)
            }
            Err(e) => {
                let response = match &e {
                    PlatformError::Http { status, body } => Some(ApiResponse {
                        status: *status,
                        body: serde_json::from_str(body)
                            .unwrap_or_else(|_| Value::String(body.clone())),
                    }),
                    _ => None,
                };
                (response, Err(e))
            }
        };

        let record = ApiCallRecord {
            request,
            response,
            error: result.as_ref().err().map(ToString::to_string),
            success: result.is_ok(),
            duration_ms,
        };

        if let Some(error) = &record.error {
            debug!(
                endpoint = %record.request.endpoint,
                error = %error,
                duration_ms,
                "Platform request failed"
            );
        }
        self.notify(&record);

        result
    }

    async fn dispatch(builder: reqwest::RequestBuilder) -> PlatformResult<(u16, Value)> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PlatformError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok((status.as_u16(), Value::Null));
        }

        let value = serde_json::from_str(&text).map_err(|e| PlatformError::Decode(e.to_string()))?;
        Ok((status.as_u16(), value))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> PlatformResult<T> {
    serde_json::from_value(value).map_err(|e| PlatformError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> PlatformClient {
        PlatformClient::new(PlatformConfig::new(base, "sk-test")).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let result = PlatformClient::new(PlatformConfig::new("https://api.example.test", " "));
        assert!(matches!(
            result,
            Err(PlatformError::InvalidConfiguration(msg)) if msg.contains("API key")
        ));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let result = PlatformClient::new(PlatformConfig::new("ftp://api.example.test", "sk"));
        assert!(matches!(result, Err(PlatformError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_endpoint_url_joins_segments() {
        let c = client("https://api.example.test/");
        let url = c.endpoint_url(&["credential", "abc 1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.test/credential/abc%201");

        let c = client("https://api.example.test/v1");
        let url = c.endpoint_url(&["call"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.test/v1/call");
    }

    #[test]
    fn test_observer_registration() {
        let c = client("https://api.example.test");
        let id = c.register_observer(Arc::new(|_: &ApiCallRecord| {}));
        assert!(c.unregister_observer(id));
        assert!(!c.unregister_observer(id));
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected_before_dispatch() {
        let c = client("https://api.example.test");
        let err = c.get_call("").await.unwrap_err();
        assert!(matches!(err, PlatformError::InvalidRequest(_)));
    }
}
