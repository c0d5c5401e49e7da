use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3002
///   tls:
///     cert_path: "/etc/dialer/cert.pem"
///     key_path: "/etc/dialer/key.pem"
///
/// platform:
///   base_url: "https://api.vapi.ai"
///   api_key: "your-platform-key"
///   timeout_seconds: 30
///
/// auth:
///   api_key: "dashboard-bearer-key"
///
/// webhook:
///   secret: "shared-hmac-secret"
///   signature_header: "x-webhook-signature"
///
/// monitor:
///   message_log_capacity: 500
///   api_history_capacity: 100
///   poll_interval_ms: 3000
///   connect_timeout_ms: 10000
///
/// security:
///   cors_allowed_origins: "https://dashboard.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub platform: Option<PlatformYaml>,
    pub auth: Option<AuthYaml>,
    pub webhook: Option<WebhookYaml>,
    pub monitor: Option<MonitorYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Voice platform REST settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlatformYaml {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Dashboard authentication from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    /// Bearer key required on `/api` routes; unset disables auth
    pub api_key: Option<String>,
}

/// Webhook receiver settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebhookYaml {
    pub secret: Option<String>,
    pub signature_header: Option<String>,
}

/// Call monitor tunables from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MonitorYaml {
    pub message_log_capacity: Option<usize>,
    pub api_history_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
