//! Voice platform REST client.
//!
//! # Resources
//!
//! | Resource | Operations |
//! |----------|------------|
//! | `/phone-number` | list, create, update, delete |
//! | `/credential` | list, get, create, update (unsupported), delete |
//! | `/assistant` | list, get, create, update, delete |
//! | `/call` | create, get |

mod base;
mod client;
mod config;
mod history;
mod messages;

pub use base::{
    ApiCallRecord, ApiObserver, ApiRequest, ApiResponse, ObserverId, PlatformError,
    PlatformResult, SharedObserver,
};
pub use client::PlatformClient;
pub use config::{DEFAULT_PLATFORM_BASE_URL, DEFAULT_TIMEOUT_SECS, PlatformConfig};
pub use history::{ApiHistory, DEFAULT_HISTORY_CAPACITY};
pub use messages::{
    Assistant, Call, CallMonitorUrls, CreateCallRequest, CreateCredentialRequest,
    CreatePhoneNumberRequest, Credential, Customer, MonitorPlan, PhoneNumber, SipGateway,
};
