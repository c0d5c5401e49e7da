pub mod platform;
pub mod realtime;
pub mod webhook;

// Re-export commonly used types for convenience
pub use platform::{
    ApiCallRecord, ApiHistory, ApiObserver, Call, CreateCallRequest, PlatformClient,
    PlatformConfig, PlatformError, PlatformResult,
};

pub use realtime::{
    CallMonitor, CallSession, CallStatus, ChannelState, ChannelStatus, MessageKind,
    MonitorConfig, MonitorMode, RealtimeError, RealtimeMessage, RealtimeResult,
};

pub use webhook::{WebhookEvent, WebhookPayload, WebhookStore};
