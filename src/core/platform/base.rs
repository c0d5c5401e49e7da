//! Error and diagnostics types shared by the platform client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned by [`PlatformClient`](super::PlatformClient) operations.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Non-2xx response from the platform
    #[error("Platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network or TLS failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not the expected JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The platform cannot perform the operation in place
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Request rejected before dispatch
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client misconfiguration (missing key, bad base URL)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PlatformError {
    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PlatformError::Decode(e.to_string())
        } else {
            PlatformError::Transport(e.to_string())
        }
    }
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

// =============================================================================
// Diagnostics
// =============================================================================

/// Description of an outgoing request, recorded before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub method: String,
    pub endpoint: String,
    /// Human-readable purpose, e.g. "List phone numbers"
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Unix epoch milliseconds
    pub timestamp_ms: u64,
}

/// Successful or failed response summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// A request together with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallRecord {
    pub request: ApiRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ApiResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
    pub duration_ms: u64,
}

/// Receives a record of every platform request.
///
/// Observers run inline on the request path and must not block.
pub trait ApiObserver: Send + Sync {
    fn on_api_call(&self, record: &ApiCallRecord);
}

impl<F> ApiObserver for F
where
    F: Fn(&ApiCallRecord) + Send + Sync,
{
    fn on_api_call(&self, record: &ApiCallRecord) {
        self(record)
    }
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn ApiObserver>;

/// Registration handle returned by `register_observer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);
