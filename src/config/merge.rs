//! Merging YAML overrides onto the environment configuration

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};

/// Environment configuration with YAML values layered on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            let current = config.tls.take();
            let cert_path = tls
                .cert_path
                .map(PathBuf::from)
                .or_else(|| current.as_ref().map(|t| t.cert_path.clone()))
                .unwrap_or_default();
            let key_path = tls
                .key_path
                .map(PathBuf::from)
                .or_else(|| current.as_ref().map(|t| t.key_path.clone()))
                .unwrap_or_default();
            config.tls = if cert_path.as_os_str().is_empty() && key_path.as_os_str().is_empty() {
                None
            } else {
                Some(TlsConfig {
                    cert_path,
                    key_path,
                })
            };
        }
    }

    if let Some(platform) = yaml.platform {
        if let Some(base_url) = platform.base_url {
            config.platform_base_url = base_url;
        }
        if platform.api_key.is_some() {
            config.platform_api_key = platform.api_key;
        }
        if let Some(timeout) = platform.timeout_seconds {
            config.platform_timeout_seconds = timeout;
        }
    }

    if let Some(auth) = yaml.auth
        && auth.api_key.is_some()
    {
        config.auth_api_key = auth.api_key;
    }

    if let Some(webhook) = yaml.webhook {
        if webhook.secret.is_some() {
            config.webhook_secret = webhook.secret;
        }
        if let Some(header) = webhook.signature_header {
            config.webhook_signature_header = header.to_ascii_lowercase();
        }
    }

    if let Some(monitor) = yaml.monitor {
        if let Some(capacity) = monitor.message_log_capacity {
            config.message_log_capacity = capacity;
        }
        if let Some(capacity) = monitor.api_history_capacity {
            config.api_history_capacity = capacity;
        }
        if let Some(interval) = monitor.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        if let Some(timeout) = monitor.connect_timeout_ms {
            config.connect_timeout_ms = timeout;
        }
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    Ok(config)
}
