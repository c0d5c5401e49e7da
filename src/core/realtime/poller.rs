//! Fallback poller for calls without a realtime endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{MessageKind, MessagePayload, MessageSource};
use super::log::MessageLog;
use super::session::{CallStatus, SessionTracker};
use crate::core::platform::{Call, PlatformClient, PlatformResult};

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Source of call status documents.
#[async_trait]
pub trait CallStatusSource: Send + Sync {
    async fn fetch_call(&self, call_id: &str) -> PlatformResult<Call>;
}

#[async_trait]
impl CallStatusSource for PlatformClient {
    async fn fetch_call(&self, call_id: &str) -> PlatformResult<Call> {
        self.get_call(call_id).await
    }
}

/// Why polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A listen endpoint appeared and switching was allowed
    ListenUrlDiscovered(String),
    /// The call reached a terminal status
    Terminal(CallStatus),
    /// Cancelled
    Stopped,
}

/// Periodically fetches `GET /call/{id}` until the call ends, a realtime
/// endpoint appears, or the poller is cancelled.
pub struct FallbackPoller {
    call_id: String,
    source: Arc<dyn CallStatusSource>,
    log: Arc<MessageLog>,
    session: SessionTracker,
    interval: Duration,
    allow_switch: bool,
}

impl FallbackPoller {
    pub fn new(
        call_id: impl Into<String>,
        source: Arc<dyn CallStatusSource>,
        log: Arc<MessageLog>,
        session: SessionTracker,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            source,
            log,
            session,
            interval: DEFAULT_POLL_INTERVAL,
            allow_switch: true,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Whether a discovered listen endpoint ends polling.
    ///
    /// Disabled for the poller that replaces a failed channel.
    pub fn allow_switch(mut self, allow: bool) -> Self {
        self.allow_switch = allow;
        self
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub async fn run(&self, cancel: CancellationToken) -> PollOutcome {
        info!(call_id = %self.call_id, interval_ms = self.interval.as_millis() as u64, "Polling call status");

        // First fetch one full interval after start
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(call_id = %self.call_id, "Poller cancelled");
                    return PollOutcome::Stopped;
                }
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Stopped,
                result = self.source.fetch_call(&self.call_id) => result,
            };

            match fetched {
                Ok(call) => {
                    if let Some(outcome) = self.on_call(&call) {
                        return outcome;
                    }
                }
                Err(e) => {
                    warn!(call_id = %self.call_id, error = %e, "Call status poll failed");
                    self.log.note(
                        MessageKind::Error,
                        MessageSource::Poller,
                        format!("poll failed: {e}"),
                    );
                }
            }
        }
    }

    fn on_call(&self, call: &Call) -> Option<PollOutcome> {
        let listen_url = call.listen_url();
        self.log.append(
            MessageKind::Poll,
            MessageSource::Poller,
            MessagePayload::Json(json!({
                "id": call.id,
                "status": call.status,
                "hasListenUrl": listen_url.is_some(),
            })),
        );
        self.session.apply_call(call);

        if let Some(url) = listen_url
            && self.allow_switch
        {
            info!(call_id = %self.call_id, "Listen endpoint discovered while polling");
            self.log.note(
                MessageKind::Poll,
                MessageSource::Poller,
                "listen endpoint discovered, switching to realtime channel",
            );
            return Some(PollOutcome::ListenUrlDiscovered(url.to_string()));
        }

        let status = call.status.as_deref().map(CallStatus::parse)?;
        if status.is_terminal() {
            info!(call_id = %self.call_id, status = %status, "Call finished, polling stopped");
            self.log.note(
                MessageKind::Poll,
                MessageSource::Poller,
                format!("call {status}, polling stopped"),
            );
            return Some(PollOutcome::Terminal(status));
        }
        None
    }
}
