//! Platform client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Default REST base URL of the voice platform.
pub const DEFAULT_PLATFORM_BASE_URL: &str = "https://api.vapi.ai";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for [`PlatformClient`](super::PlatformClient).
#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// REST base URL without trailing slash
    pub base_url: String,
    /// Bearer key sent with every request
    pub api_key: String,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl PlatformConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS.min(self.timeout_seconds.max(1)))
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PLATFORM_BASE_URL, String::new())
    }
}

// Keep the key out of debug output
impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Drop for PlatformConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}
