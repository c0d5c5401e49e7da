//! Base types for the live call event stream.
//!
//! This module defines the shared vocabulary of the realtime subsystem: the
//! error type, the channel state machine, reconnection policy and the
//! canonical log entry every inbound event is turned into.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::platform::PlatformError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while monitoring a call.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The realtime endpoint URL is unusable
    #[error("Invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection to the realtime endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No open confirmation before the connect deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Call result is missing the fields needed to start monitoring
    #[error("Invalid call: {0}")]
    InvalidCall(String),

    /// No session is being monitored
    #[error("No active call session")]
    NotActive,

    /// Platform request failed
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Reconnection Policy
// =============================================================================

/// Maximum number of automatic reconnect attempts per channel.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Default deadline for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default base delay for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Connect and reconnect behaviour of a realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectionConfig {
    /// Maximum reconnect attempts after a failure. Clamped to
    /// [`MAX_RECONNECT_ATTEMPTS`].
    pub max_attempts: u32,

    /// Delay unit for exponential backoff (milliseconds).
    /// Default: 1000ms
    pub base_delay_ms: u64,

    /// Handshake deadline (milliseconds).
    /// Default: 10000ms
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_BACKOFF_BASE.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ReconnectionConfig {
    /// Effective attempt limit.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.min(MAX_RECONNECT_ATTEMPTS)
    }

    /// Backoff before the next attempt, given how many retries already ran.
    ///
    /// `delay = base * 2^retry_count`, so the first retry waits one base unit.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u64 << retry_count.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Check if another reconnect attempt is allowed.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_attempts()
    }

    /// Handshake deadline.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// =============================================================================
// Channel State
// =============================================================================

/// Lifecycle of a realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// No connection requested yet
    #[default]
    Idle,
    /// Handshake in flight
    Connecting,
    /// Receiving events
    Connected,
    /// Closed cleanly by the remote end or by us
    Closed,
    /// Failed; may be followed by a reconnect attempt
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Idle => write!(f, "idle"),
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Connected => write!(f, "connected"),
            ChannelState::Closed => write!(f, "closed"),
            ChannelState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a channel published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    /// Endpoint the channel connects to
    pub url: String,
    /// Current state
    pub state: ChannelState,
    /// Reconnect attempts since the last successful open
    pub retry_count: u32,
}

impl ChannelStatus {
    pub fn connected(&self) -> bool {
        self.state == ChannelState::Connected
    }
}

// =============================================================================
// Log Entries
// =============================================================================

/// Classification of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Channel lifecycle transition
    Connection,
    /// Structured (JSON) event
    Message,
    /// Free-form text or binary data
    Raw,
    /// Failure of any source
    Error,
    /// Informational note
    Info,
    /// Poller tick
    Poll,
}

/// Which component produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageSource {
    RealtimeChannel,
    Poller,
    Monitor,
}

/// Payload of a log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum MessagePayload {
    /// Parsed JSON document
    Json(Value),
    /// Free-form text
    Text(String),
    /// Reference to a stored binary frame
    Binary {
        /// Where the frame can be downloaded from
        locator: String,
        /// Frame length in bytes
        #[serde(rename = "sizeBytes")]
        size_bytes: usize,
    },
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePayload::Text(text.into())
    }

    /// JSON view of the payload, if it is structured.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            MessagePayload::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// One entry of the call event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMessage {
    /// Monotonic sequence number within the log
    pub id: u64,
    pub kind: MessageKind,
    pub payload: MessagePayload,
    /// Receipt time, Unix epoch milliseconds
    pub timestamp: u64,
    pub source: MessageSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let config = ReconnectionConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_limit_is_clamped() {
        let config = ReconnectionConfig {
            max_attempts: 10,
            ..Default::default()
        };
        assert_eq!(config.max_attempts(), MAX_RECONNECT_ATTEMPTS);
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
    }

    #[test]
    fn test_default_connect_timeout() {
        let config = ReconnectionConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_payload_serialization_shape() {
        let payload = MessagePayload::Binary {
            locator: "/api/session/frames/abc".to_string(),
            size_bytes: 320,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "binary");
        assert_eq!(json["data"]["sizeBytes"], 320);

        let source = serde_json::to_value(MessageSource::RealtimeChannel).unwrap();
        assert_eq!(source, "realtime-channel");
    }

    #[test]
    fn test_channel_state_display() {
        assert_eq!(ChannelState::Connecting.to_string(), "connecting");
        assert_eq!(ChannelState::Failed.to_string(), "failed");
    }
}
