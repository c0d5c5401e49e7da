use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::platform::{ApiHistory, PlatformClient, PlatformResult, SharedObserver};
use crate::core::realtime::CallMonitor;
use crate::core::webhook::WebhookStore;
use crate::errors::app_error::{AppError, AppResult};

/// Shared state of the dashboard server
///
/// Built once at startup. The platform client and call monitor are absent
/// when no platform API key is configured; routes that need them answer 503.
pub struct AppState {
    pub config: ServerConfig,
    pub platform: Option<PlatformClient>,
    pub history: Arc<ApiHistory>,
    pub monitor: Option<CallMonitor>,
    pub webhooks: WebhookStore,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// # Errors
    /// Fails when a platform key is configured but the client cannot be
    /// constructed.
    pub fn new(config: ServerConfig) -> PlatformResult<Arc<Self>> {
        let platform = match config.platform_config() {
            Ok(platform_config) => Some(PlatformClient::new(platform_config)?),
            Err(reason) => {
                warn!(reason = %reason, "Platform client disabled");
                None
            }
        };
        Ok(Self::build(config, platform))
    }

    /// Build state around an existing client.
    pub fn with_client(config: ServerConfig, client: PlatformClient) -> Arc<Self> {
        Self::build(config, Some(client))
    }

    fn build(config: ServerConfig, platform: Option<PlatformClient>) -> Arc<Self> {
        let history = Arc::new(ApiHistory::new(config.api_history_capacity));

        let monitor = platform.as_ref().map(|client| {
            client.register_observer(history.clone() as SharedObserver);
            info!(base_url = %client.base_url(), "Platform client ready");
            CallMonitor::new(Arc::new(client.clone()), config.monitor_config())
        });

        Arc::new(Self {
            config,
            platform,
            history,
            monitor,
            webhooks: WebhookStore::new(),
        })
    }

    pub fn platform(&self) -> AppResult<&PlatformClient> {
        self.platform
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("platform API key is not configured".to_string()))
    }

    pub fn monitor(&self) -> AppResult<&CallMonitor> {
        self.monitor
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("platform API key is not configured".to_string()))
    }
}
