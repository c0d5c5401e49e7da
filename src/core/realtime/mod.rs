//! Live call event stream.
//!
//! This module keeps exactly one event source alive for the monitored call
//! and turns everything it receives into uniform log entries.
//!
//! # Components
//!
//! - [`EventNormalizer`] classifies text, JSON and binary payloads
//! - [`MessageLog`] / [`FrameStore`] bounded storage of entries and frames
//! - [`ChannelManager`] WebSocket to the monitor listen endpoint with
//!   connect timeout and bounded exponential backoff
//! - [`FallbackPoller`] periodic `GET /call/{id}` when no endpoint exists
//! - [`SessionTracker`] latest known state of the call
//! - [`CallMonitor`] supervisor running channel and poller one at a time
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waav_dialer::core::platform::{PlatformClient, PlatformConfig};
//! use waav_dialer::core::realtime::{CallMonitor, MonitorConfig};
//!
//! let client = PlatformClient::new(PlatformConfig::new("https://api.vapi.ai", "sk-..."))?;
//! let monitor = CallMonitor::new(Arc::new(client.clone()), MonitorConfig::default());
//!
//! let mut events = monitor.subscribe();
//! monitor.attach("call-id").await?;
//! while let Ok(entry) = events.recv().await {
//!     println!("{}", serde_json::to_string(&entry)?);
//! }
//! ```

mod base;
mod channel;
mod log;
mod monitor;
mod normalizer;
mod poller;
mod session;

pub use base::{
    ChannelState, ChannelStatus, DEFAULT_BACKOFF_BASE, DEFAULT_CONNECT_TIMEOUT,
    MAX_RECONNECT_ATTEMPTS, MessageKind, MessagePayload, MessageSource, RealtimeError,
    RealtimeMessage, RealtimeResult, ReconnectionConfig,
};
pub use channel::{BinaryFrameMode, ChannelManager};
pub use log::{DEFAULT_LOG_CAPACITY, FRAME_LOCATOR_PREFIX, FrameStore, MessageLog};
pub use monitor::{CallMonitor, MonitorConfig, MonitorMode, MonitorSnapshot};
pub use normalizer::{
    BLOB_PROBE_LEN, EventNormalizer, InboundPayload, NormalizedMessage, PRINTABLE_THRESHOLD,
    SNIFF_SAMPLE_LEN, printable_ratio,
};
pub use poller::{CallStatusSource, DEFAULT_POLL_INTERVAL, FallbackPoller, PollOutcome};
pub use session::{CallSession, CallStatus, SessionTracker};
