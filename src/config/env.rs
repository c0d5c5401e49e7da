//! Environment variable loading

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ServerConfig, TlsConfig, defaults};

/// Read a variable, treating empty values as unset.
pub(super) fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable.
pub(super) fn parse_var<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ('{raw}'): {e}").into()),
        None => Ok(None),
    }
}

/// Build a configuration from environment variables and defaults.
///
/// `.env` values are expected to be loaded into the process environment
/// before this runs.
pub(super) fn load() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (None, None) => None,
        (cert, key) => Some(TlsConfig {
            cert_path: cert.map(PathBuf::from).unwrap_or_default(),
            key_path: key.map(PathBuf::from).unwrap_or_default(),
        }),
    };

    Ok(ServerConfig {
        host: var("HOST").unwrap_or_else(|| defaults::HOST.to_string()),
        port: parse_var("PORT")?.unwrap_or(defaults::PORT),
        tls,
        platform_base_url: var("PLATFORM_BASE_URL")
            .unwrap_or_else(|| defaults::PLATFORM_BASE_URL.to_string()),
        platform_api_key: var("PLATFORM_API_KEY"),
        platform_timeout_seconds: parse_var("PLATFORM_TIMEOUT_SECONDS")?
            .unwrap_or(defaults::PLATFORM_TIMEOUT_SECONDS),
        auth_api_key: var("DIALER_API_KEY"),
        webhook_secret: var("WEBHOOK_SECRET"),
        webhook_signature_header: var("WEBHOOK_SIGNATURE_HEADER")
            .map(|h| h.to_ascii_lowercase())
            .unwrap_or_else(|| defaults::WEBHOOK_SIGNATURE_HEADER.to_string()),
        message_log_capacity: parse_var("MESSAGE_LOG_CAPACITY")?
            .unwrap_or(defaults::MESSAGE_LOG_CAPACITY),
        api_history_capacity: parse_var("API_HISTORY_CAPACITY")?
            .unwrap_or(defaults::API_HISTORY_CAPACITY),
        poll_interval_ms: parse_var("POLL_INTERVAL_MS")?.unwrap_or(defaults::POLL_INTERVAL_MS),
        connect_timeout_ms: parse_var("CONNECT_TIMEOUT_MS")?
            .unwrap_or(defaults::CONNECT_TIMEOUT_MS),
        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_var("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(defaults::RATE_LIMIT_REQUESTS_PER_SECOND),
        rate_limit_burst_size: parse_var("RATE_LIMIT_BURST_SIZE")?
            .unwrap_or(defaults::RATE_LIMIT_BURST_SIZE),
    })
}
