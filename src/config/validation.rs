//! Configuration validation logic

use super::ServerConfig;
use super::defaults::MIN_POLL_INTERVAL_MS;
use crate::utils::validate_http_url;

/// Validate a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.port == 0 {
        return Err("PORT must be non-zero".into());
    }

    validate_http_url(&config.platform_base_url)
        .map_err(|e| format!("PLATFORM_BASE_URL is invalid: {e}"))?;

    if config.platform_timeout_seconds == 0 {
        return Err("PLATFORM_TIMEOUT_SECONDS must be greater than zero".into());
    }
    if config.message_log_capacity == 0 {
        return Err("MESSAGE_LOG_CAPACITY must be greater than zero".into());
    }
    if config.api_history_capacity == 0 {
        return Err("API_HISTORY_CAPACITY must be greater than zero".into());
    }
    if config.poll_interval_ms < MIN_POLL_INTERVAL_MS {
        return Err(format!(
            "POLL_INTERVAL_MS must be at least {MIN_POLL_INTERVAL_MS} (got {})",
            config.poll_interval_ms
        )
        .into());
    }
    if config.connect_timeout_ms == 0 {
        return Err("CONNECT_TIMEOUT_MS must be greater than zero".into());
    }
    if config.webhook_signature_header.is_empty() {
        return Err("WEBHOOK_SIGNATURE_HEADER must not be empty".into());
    }
    http::HeaderName::from_bytes(config.webhook_signature_header.as_bytes())
        .map_err(|e| format!("WEBHOOK_SIGNATURE_HEADER is not a valid header name: {e}"))?;

    validate_tls(config)?;

    Ok(())
}

fn validate_tls(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    match (
        tls.cert_path.as_os_str().is_empty(),
        tls.key_path.as_os_str().is_empty(),
    ) {
        (false, false) => Ok(()),
        (true, _) => Err("TLS_CERT_PATH is required when TLS_KEY_PATH is set".into()),
        (_, true) => Err("TLS_KEY_PATH is required when TLS_CERT_PATH is set".into()),
    }
}
