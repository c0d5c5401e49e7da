//! Configuration module for the dialer server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_dialer::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroize;

use crate::core::platform::PlatformConfig;
use crate::core::realtime::{MonitorConfig, ReconnectionConfig};

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default values applied when neither YAML nor environment sets a field.
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 3002;
    pub const PLATFORM_BASE_URL: &str = crate::core::platform::DEFAULT_PLATFORM_BASE_URL;
    pub const PLATFORM_TIMEOUT_SECONDS: u64 = crate::core::platform::DEFAULT_TIMEOUT_SECS;
    pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";
    pub const MESSAGE_LOG_CAPACITY: usize = crate::core::realtime::DEFAULT_LOG_CAPACITY;
    pub const API_HISTORY_CAPACITY: usize = crate::core::platform::DEFAULT_HISTORY_CAPACITY;
    pub const POLL_INTERVAL_MS: u64 = 3_000;
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;
    pub const RATE_LIMIT_REQUESTS_PER_SECOND: u32 = 60;
    pub const RATE_LIMIT_BURST_SIZE: u32 = 10;
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the dialer server:
/// - Server settings (host, port, TLS)
/// - Voice platform REST settings
/// - Dashboard authentication and webhook verification
/// - Call monitor tunables
/// - Security settings (CORS, rate limiting)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Voice platform
    pub platform_base_url: String,
    pub platform_api_key: Option<String>,
    pub platform_timeout_seconds: u64,

    /// Bearer key for `/api` routes. `None` disables authentication.
    pub auth_api_key: Option<String>,

    // Webhook receiver
    /// HMAC secret; `None` stores webhooks unverified
    pub webhook_secret: Option<String>,
    /// Lowercase header carrying the signature
    pub webhook_signature_header: String,

    // Call monitor
    pub message_log_capacity: usize,
    pub api_history_capacity: usize,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.platform_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.auth_api_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.webhook_secret {
            secret.zeroize();
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() { "<redacted>" } else { "<unset>" }
        }

        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("platform_base_url", &self.platform_base_url)
            .field("platform_api_key", &redact(&self.platform_api_key))
            .field("platform_timeout_seconds", &self.platform_timeout_seconds)
            .field("auth_api_key", &redact(&self.auth_api_key))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("webhook_signature_header", &self.webhook_signature_header)
            .field("message_log_capacity", &self.message_log_capacity)
            .field("api_history_capacity", &self.api_history_capacity)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field(
                "rate_limit_requests_per_second",
                &self.rate_limit_requests_per_second,
            )
            .field("rate_limit_burst_size", &self.rate_limit_burst_size)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// `.env` is loaded in `main.rs`; actual environment variables override
    /// its values. Unset fields fall back to [`defaults`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if `/api` routes require a bearer key
    pub fn auth_enabled(&self) -> bool {
        self.auth_api_key.is_some()
    }

    /// Platform client settings
    ///
    /// # Errors
    /// Returns an error if `PLATFORM_API_KEY` is not configured.
    pub fn platform_config(&self) -> Result<PlatformConfig, String> {
        let api_key = self
            .platform_api_key
            .clone()
            .ok_or_else(|| "PLATFORM_API_KEY is not configured".to_string())?;

        Ok(PlatformConfig {
            base_url: self.platform_base_url.clone(),
            api_key,
            timeout_seconds: self.platform_timeout_seconds,
        })
    }

    /// Call monitor settings
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reconnection: ReconnectionConfig {
                connect_timeout_ms: self.connect_timeout_ms,
                ..Default::default()
            },
            log_capacity: self.message_log_capacity,
            ..Default::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            tls: None,
            platform_base_url: defaults::PLATFORM_BASE_URL.to_string(),
            platform_api_key: None,
            platform_timeout_seconds: defaults::PLATFORM_TIMEOUT_SECONDS,
            auth_api_key: None,
            webhook_secret: None,
            webhook_signature_header: defaults::WEBHOOK_SIGNATURE_HEADER.to_string(),
            message_log_capacity: defaults::MESSAGE_LOG_CAPACITY,
            api_history_capacity: defaults::API_HISTORY_CAPACITY,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: defaults::RATE_LIMIT_REQUESTS_PER_SECOND,
            rate_limit_burst_size: defaults::RATE_LIMIT_BURST_SIZE,
        }
    }
}
