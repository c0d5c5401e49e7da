//! Call monitor.
//!
//! [`CallMonitor`] owns the session tracker, the event log and a single
//! supervisor task per monitored call. The supervisor runs the realtime
//! channel and the fallback poller one after the other, never both:
//!
//! - call has a listen endpoint: channel
//! - no listen endpoint: poller; a discovered endpoint stops it and opens
//!   the channel
//! - channel out of retries: poller that does not switch back
//!
//! Starting a new call or stopping the monitor cancels the supervisor and
//! waits for it, so no socket or timer outlives its session.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{
    ChannelState, ChannelStatus, MessageKind, MessageSource, RealtimeError, RealtimeMessage,
    RealtimeResult, ReconnectionConfig,
};
use super::channel::{BinaryFrameMode, ChannelManager};
use super::log::{DEFAULT_LOG_CAPACITY, FrameStore, MessageLog};
use super::normalizer::EventNormalizer;
use super::poller::{CallStatusSource, DEFAULT_POLL_INTERVAL, FallbackPoller, PollOutcome};
use super::session::{CallSession, SessionTracker};
use crate::core::platform::Call;

/// Tunables of a [`CallMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub reconnection: ReconnectionConfig,
    /// Entries kept in the log; also bounds the frame store
    pub log_capacity: usize,
    pub binary_mode: BinaryFrameMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnection: ReconnectionConfig::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            binary_mode: BinaryFrameMode::default(),
        }
    }
}

/// Which event source is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    #[default]
    Idle,
    Channel,
    Polling,
}

/// State view for the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub session: Option<CallSession>,
    pub mode: MonitorMode,
    pub channel: ChannelStatus,
}

struct ActiveMonitor {
    call_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything the supervisor task needs, cloned out of the monitor.
#[derive(Clone)]
struct Supervisor {
    source: Arc<dyn CallStatusSource>,
    config: MonitorConfig,
    log: Arc<MessageLog>,
    normalizer: EventNormalizer,
    session: SessionTracker,
    mode: Arc<watch::Sender<MonitorMode>>,
    channel_status: Arc<watch::Sender<ChannelStatus>>,
}

enum Next {
    Channel(String),
    Poll { allow_switch: bool },
}

/// Coordinates realtime monitoring of at most one call.
pub struct CallMonitor {
    supervisor: Supervisor,
    active: Mutex<Option<ActiveMonitor>>,
}

impl CallMonitor {
    pub fn new(source: Arc<dyn CallStatusSource>, config: MonitorConfig) -> Self {
        let log = Arc::new(MessageLog::new(config.log_capacity));
        let normalizer = EventNormalizer::new(FrameStore::new(config.log_capacity));
        let (mode, _) = watch::channel(MonitorMode::Idle);
        let (channel_status, _) = watch::channel(ChannelStatus::default());

        Self {
            supervisor: Supervisor {
                source,
                config,
                log,
                normalizer,
                session: SessionTracker::new(),
                mode: Arc::new(mode),
                channel_status: Arc::new(channel_status),
            },
            active: Mutex::new(None),
        }
    }

    /// Start monitoring `call`, replacing any current session.
    pub async fn start(&self, call: &Call) -> RealtimeResult<CallSession> {
        if call.id.trim().is_empty() {
            return Err(RealtimeError::InvalidCall(
                "call result has no id".to_string(),
            ));
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            debug!(call_id = %previous.call_id, "Replacing monitored call");
            shutdown(previous).await;
        }

        let sv = &self.supervisor;
        sv.log.clear();
        sv.normalizer.frames().clear();
        sv.channel_status.send_replace(ChannelStatus::default());

        let session = CallSession::from_call(call);
        sv.session.start(session.clone());

        sv.log.note(
            MessageKind::Info,
            MessageSource::Monitor,
            format!("monitoring call {}", call.id),
        );
        if let Some(control_url) = call.control_url() {
            sv.log.note(
                MessageKind::Info,
                MessageSource::Monitor,
                format!("control endpoint available: {control_url}"),
            );
        }

        let first = match call.listen_url() {
            Some(url) => {
                sv.mode.send_replace(MonitorMode::Channel);
                Next::Channel(url.to_string())
            }
            None => {
                sv.log.note(
                    MessageKind::Info,
                    MessageSource::Monitor,
                    "no listen endpoint yet, polling call status",
                );
                sv.mode.send_replace(MonitorMode::Polling);
                Next::Poll { allow_switch: true }
            }
        };

        info!(call_id = %call.id, "Call monitoring started");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(sv.clone().run(call.id.clone(), first, cancel.clone()));
        *active = Some(ActiveMonitor {
            call_id: call.id.clone(),
            cancel,
            task,
        });

        Ok(session)
    }

    /// Fetch `call_id` and start monitoring it.
    pub async fn attach(&self, call_id: &str) -> RealtimeResult<CallSession> {
        let call = self.supervisor.source.fetch_call(call_id).await?;
        self.start(&call).await
    }

    /// Stop monitoring and discard the session.
    pub async fn stop(&self) -> RealtimeResult<()> {
        let previous = self.active.lock().await.take();
        let Some(previous) = previous else {
            return Err(RealtimeError::NotActive);
        };

        let call_id = previous.call_id.clone();
        shutdown(previous).await;
        self.supervisor.session.clear();
        self.supervisor.log.note(
            MessageKind::Info,
            MessageSource::Monitor,
            format!("monitoring of call {call_id} stopped"),
        );
        info!(call_id = %call_id, "Call monitoring stopped");
        Ok(())
    }

    /// Resolves once the current supervisor has finished.
    pub async fn finished(&self) {
        let mut mode = self.supervisor.mode.subscribe();
        // Sender is owned by self
        let _ = mode.wait_for(|m| *m == MonitorMode::Idle).await;
    }

    pub fn mode(&self) -> MonitorMode {
        *self.supervisor.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<MonitorMode> {
        self.supervisor.mode.subscribe()
    }

    pub fn channel_status(&self) -> ChannelStatus {
        self.supervisor.channel_status.borrow().clone()
    }

    pub fn session(&self) -> Option<CallSession> {
        self.supervisor.session.snapshot()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            session: self.session(),
            mode: self.mode(),
            channel: self.channel_status(),
        }
    }

    pub fn log(&self) -> &Arc<MessageLog> {
        &self.supervisor.log
    }

    pub fn frames(&self) -> &FrameStore {
        self.supervisor.normalizer.frames()
    }

    /// Receive every log entry appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.supervisor.log.subscribe()
    }
}

impl Drop for CallMonitor {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.active.try_lock()
            && let Some(active) = guard.take()
        {
            active.cancel.cancel();
            active.task.abort();
        }
    }
}

async fn shutdown(active: ActiveMonitor) {
    active.cancel.cancel();
    if let Err(e) = active.task.await
        && !e.is_cancelled()
    {
        warn!(call_id = %active.call_id, error = %e, "Monitor task ended abnormally");
    }
}

impl Supervisor {
    async fn run(self, call_id: String, first: Next, cancel: CancellationToken) {
        let mut next = first;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match next {
                Next::Channel(url) => {
                    self.mode.send_replace(MonitorMode::Channel);
                    let channel = match ChannelManager::new(
                        &url,
                        self.log.clone(),
                        self.session.clone(),
                        self.normalizer.clone(),
                    ) {
                        Ok(channel) => channel
                            .with_reconnection(self.config.reconnection.clone())
                            .with_binary_mode(self.config.binary_mode)
                            .with_status_sender(self.channel_status.clone()),
                        Err(e) => {
                            warn!(call_id = %call_id, error = %e, "Unusable listen endpoint");
                            self.log
                                .note(MessageKind::Error, MessageSource::Monitor, e.to_string());
                            next = Next::Poll {
                                allow_switch: false,
                            };
                            continue;
                        }
                    };

                    match channel.run(cancel.clone()).await {
                        ChannelState::Failed => {
                            self.log.note(
                                MessageKind::Info,
                                MessageSource::Monitor,
                                "realtime channel failed, falling back to polling",
                            );
                            next = Next::Poll {
                                allow_switch: false,
                            };
                        }
                        _ => break,
                    }
                }
                Next::Poll { allow_switch } => {
                    self.mode.send_replace(MonitorMode::Polling);
                    let poller = FallbackPoller::new(
                        call_id.clone(),
                        self.source.clone(),
                        self.log.clone(),
                        self.session.clone(),
                    )
                    .with_interval(self.config.poll_interval)
                    .allow_switch(allow_switch);

                    match poller.run(cancel.clone()).await {
                        PollOutcome::ListenUrlDiscovered(url) => next = Next::Channel(url),
                        PollOutcome::Terminal(_) | PollOutcome::Stopped => break,
                    }
                }
            }
        }

        debug!(call_id = %call_id, "Monitor supervisor finished");
        self.mode.send_replace(MonitorMode::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::PlatformResult;
    use async_trait::async_trait;
    use serde_json::json;

    struct Ended;

    #[async_trait]
    impl CallStatusSource for Ended {
        async fn fetch_call(&self, call_id: &str) -> PlatformResult<Call> {
            Ok(serde_json::from_value(json!({"id": call_id, "status": "ended"})).unwrap())
        }
    }

    fn monitor() -> CallMonitor {
        CallMonitor::new(
            Arc::new(Ended),
            MonitorConfig {
                poll_interval: Duration::from_millis(10),
                ..Default::default()
            },
        )
    }

    fn call(value: serde_json::Value) -> Call {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_call_without_id_is_rejected() {
        let monitor = monitor();
        let result = monitor.start(&call(json!({"status": "queued"}))).await;
        assert!(matches!(result, Err(RealtimeError::InvalidCall(_))));
        assert_eq!(monitor.mode(), MonitorMode::Idle);
    }

    #[tokio::test]
    async fn test_polling_until_terminal() {
        let monitor = monitor();
        monitor
            .start(&call(json!({"id": "call-1", "status": "queued"})))
            .await
            .unwrap();
        assert_eq!(monitor.mode(), MonitorMode::Polling);

        monitor.finished().await;
        assert_eq!(monitor.mode(), MonitorMode::Idle);
        assert_eq!(monitor.session().unwrap().status.as_str(), "ended");
    }

    #[tokio::test]
    async fn test_control_url_is_logged_not_opened() {
        let monitor = monitor();
        monitor
            .start(&call(json!({
                "id": "call-1",
                "monitor": {"controlUrl": "https://control.example.test/c"}
            })))
            .await
            .unwrap();

        let infos: Vec<_> = monitor
            .log()
            .snapshot()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Info)
            .collect();
        assert!(infos.iter().any(|m| matches!(
            &m.payload,
            crate::core::realtime::MessagePayload::Text(t) if t.contains("control.example.test")
        )));
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let monitor = monitor();
        assert!(matches!(monitor.stop().await, Err(RealtimeError::NotActive)));
    }

    #[tokio::test]
    async fn test_stop_clears_session() {
        let monitor = CallMonitor::new(
            Arc::new(Ended),
            MonitorConfig {
                poll_interval: Duration::from_secs(60),
                ..Default::default()
            },
        );
        monitor.start(&call(json!({"id": "call-1"}))).await.unwrap();
        assert!(monitor.session().is_some());

        monitor.stop().await.unwrap();
        assert!(monitor.session().is_none());
        assert_eq!(monitor.mode(), MonitorMode::Idle);
    }
}
