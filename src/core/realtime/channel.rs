//! Realtime channel manager.
//!
//! Owns one WebSocket to the monitor listen endpoint of a call. The run loop
//! drives the state machine
//!
//! ```text
//! Idle -> Connecting -> Connected -> Closed
//!             |             |
//!             v             v
//!           Failed <--------+  (retry with backoff, at most 3 times)
//! ```
//!
//! and publishes every transition as a [`ChannelStatus`] snapshot on a
//! `watch` channel. The retry counter is local to the run loop.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::base::{
    ChannelState, ChannelStatus, MessageKind, MessageSource, RealtimeError, RealtimeResult,
    ReconnectionConfig,
};
use super::log::MessageLog;
use super::normalizer::{EventNormalizer, InboundPayload};
use super::session::SessionTracker;
use crate::utils::validate_realtime_url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How binary WebSocket frames are handed to the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BinaryFrameMode {
    /// Sniff printable content before treating the frame as binary
    #[default]
    Buffer,
    /// Probe for a JSON prefix before treating the frame as binary
    Blob,
}

/// Why a connected stream stopped.
enum StreamEnd {
    Cancelled,
    RemoteClosed,
    Lost(String),
}

/// Manages the realtime channel of one call session.
pub struct ChannelManager {
    url: Url,
    reconnection: ReconnectionConfig,
    binary_mode: BinaryFrameMode,
    normalizer: EventNormalizer,
    log: Arc<MessageLog>,
    session: SessionTracker,
    status: Arc<watch::Sender<ChannelStatus>>,
}

impl ChannelManager {
    /// Create a manager for `url`. The URL must be `ws` or `wss`.
    pub fn new(
        url: &str,
        log: Arc<MessageLog>,
        session: SessionTracker,
        normalizer: EventNormalizer,
    ) -> RealtimeResult<Self> {
        let url = validate_realtime_url(url)
            .map_err(|e| RealtimeError::InvalidEndpoint(format!("{url}: {e}")))?;
        let (status, _) = watch::channel(ChannelStatus {
            url: url.to_string(),
            state: ChannelState::Idle,
            retry_count: 0,
        });
        let status = Arc::new(status);

        Ok(Self {
            url,
            reconnection: ReconnectionConfig::default(),
            binary_mode: BinaryFrameMode::default(),
            normalizer,
            log,
            session,
            status,
        })
    }

    pub fn with_reconnection(mut self, reconnection: ReconnectionConfig) -> Self {
        self.reconnection = reconnection;
        self
    }

    pub fn with_binary_mode(mut self, mode: BinaryFrameMode) -> Self {
        self.binary_mode = mode;
        self
    }

    /// Publish status on an externally owned channel.
    pub fn with_status_sender(self, status: Arc<watch::Sender<ChannelStatus>>) -> Self {
        status.send_replace(self.status.borrow().clone());
        Self { status, ..self }
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    /// Run until the channel is closed, cancelled, or out of retries.
    ///
    /// Returns the final state: [`ChannelState::Closed`] after a clean close
    /// or cancellation, [`ChannelState::Failed`] when retries are exhausted.
    ///
    /// The retry counter resets on every successful handshake, so an endpoint
    /// that accepts and then drops each connection is retried indefinitely at
    /// the base delay.
    pub async fn run(&self, cancel: CancellationToken) -> ChannelState {
        let mut retry_count: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return self.finish_closed(retry_count, "channel stopped");
            }

            self.publish(ChannelState::Connecting, retry_count);
            self.log.note(
                MessageKind::Connection,
                MessageSource::RealtimeChannel,
                format!("connecting to {}", self.url),
            );

            let connected = tokio::select! {
                _ = cancel.cancelled() => {
                    return self.finish_closed(retry_count, "channel stopped while connecting");
                }
                result = self.connect() => result,
            };

            match connected {
                Ok(ws) => {
                    retry_count = 0;
                    self.publish(ChannelState::Connected, retry_count);
                    self.log.note(
                        MessageKind::Connection,
                        MessageSource::RealtimeChannel,
                        "realtime channel connected",
                    );
                    info!(url = %self.url, "Realtime channel connected");

                    match self.pump(ws, &cancel).await {
                        StreamEnd::Cancelled => {
                            return self.finish_closed(retry_count, "channel stopped");
                        }
                        StreamEnd::RemoteClosed => {
                            info!(url = %self.url, "Realtime channel closed by remote");
                            return self.finish_closed(retry_count, "channel closed by remote");
                        }
                        StreamEnd::Lost(reason) => {
                            warn!(url = %self.url, error = %reason, "Realtime channel lost");
                            self.fail(retry_count, format!("connection lost: {reason}"));
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Realtime channel connect failed");
                    self.fail(retry_count, e.to_string());
                }
            }

            if !self.reconnection.should_retry(retry_count) {
                self.log.note(
                    MessageKind::Error,
                    MessageSource::RealtimeChannel,
                    format!("giving up after {retry_count} reconnect attempts"),
                );
                warn!(
                    url = %self.url,
                    attempts = retry_count,
                    "Realtime channel retries exhausted"
                );
                return ChannelState::Failed;
            }

            let delay = self.reconnection.delay_for(retry_count);
            retry_count += 1;
            self.publish(ChannelState::Failed, retry_count);
            self.log.note(
                MessageKind::Connection,
                MessageSource::RealtimeChannel,
                format!(
                    "reconnecting in {}ms (attempt {retry_count}/{})",
                    delay.as_millis(),
                    self.reconnection.max_attempts()
                ),
            );
            debug!(url = %self.url, attempt = retry_count, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.finish_closed(retry_count, "channel stopped before reconnect");
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Open the socket within the connect deadline.
    ///
    /// On timeout the pending handshake future is dropped, which closes the
    /// half-open socket.
    async fn connect(&self) -> RealtimeResult<WsStream> {
        let deadline = self.reconnection.connect_timeout();
        match tokio::time::timeout(deadline, connect_async(self.url.as_str())).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(RealtimeError::ConnectionFailed(e.to_string())),
            Err(_) => Err(RealtimeError::Timeout(format!(
                "no handshake from {} within {}ms",
                self.url,
                deadline.as_millis()
            ))),
        }
    }

    async fn pump(&self, ws: WsStream, cancel: &CancellationToken) -> StreamEnd {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send close frame");
                    }
                    return StreamEnd::Cancelled;
                }

                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle(InboundPayload::Text(text.to_string()));
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let payload = match self.binary_mode {
                                BinaryFrameMode::Buffer => InboundPayload::Buffer(data),
                                BinaryFrameMode::Blob => InboundPayload::Blob(data),
                            };
                            self.handle(payload);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = sink.send(Message::Pong(data)).await {
                                return StreamEnd::Lost(format!("failed to send pong: {e}"));
                            }
                        }
                        Some(Ok(Message::Close(_))) => return StreamEnd::RemoteClosed,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return StreamEnd::Lost(e.to_string()),
                        None => return StreamEnd::Lost("stream ended without close frame".to_string()),
                    }
                }
            }
        }
    }

    fn handle(&self, payload: InboundPayload) {
        let normalized = self.normalizer.normalize(payload);

        if let Some(event_type) = normalized.event_type() {
            debug!(event_type, "Realtime event");
            if matches!(event_type, "status-update" | "end-of-call-report")
                && let Some(session) = self.session.apply_event(&normalized.parsed)
            {
                debug!(call_id = %session.id, status = %session.status, "Session updated from channel");
            }
        }

        self.log.append(
            normalized.kind(),
            MessageSource::RealtimeChannel,
            normalized.into_payload(),
        );
    }

    fn fail(&self, retry_count: u32, reason: String) {
        self.publish(ChannelState::Failed, retry_count);
        self.log
            .note(MessageKind::Error, MessageSource::RealtimeChannel, reason);
    }

    fn finish_closed(&self, retry_count: u32, note: &str) -> ChannelState {
        self.publish(ChannelState::Closed, retry_count);
        self.log
            .note(MessageKind::Connection, MessageSource::RealtimeChannel, note);
        ChannelState::Closed
    }

    fn publish(&self, state: ChannelState, retry_count: u32) {
        self.status.send_replace(ChannelStatus {
            url: self.url.to_string(),
            state,
            retry_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::log::FrameStore;

    fn manager(url: &str) -> RealtimeResult<ChannelManager> {
        ChannelManager::new(
            url,
            Arc::new(MessageLog::new(50)),
            SessionTracker::new(),
            EventNormalizer::new(FrameStore::new(10)),
        )
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        assert!(matches!(
            manager("https://example.com/listen"),
            Err(RealtimeError::InvalidEndpoint(_))
        ));
        assert!(matches!(manager(""), Err(RealtimeError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_initial_status_is_idle() {
        let channel = manager("wss://monitor.example.com/listen").unwrap();
        let status = channel.status();
        assert_eq!(status.state, ChannelState::Idle);
        assert_eq!(status.retry_count, 0);
        assert_eq!(status.url, "wss://monitor.example.com/listen");
    }

    #[test]
    fn test_external_status_sender_receives_initial_state() {
        let (tx, rx) = watch::channel(ChannelStatus::default());
        let channel = manager("ws://127.0.0.1:1/listen")
            .unwrap()
            .with_status_sender(Arc::new(tx));
        assert_eq!(rx.borrow().url, channel.url());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_closes() {
        let channel = manager("ws://127.0.0.1:1/listen").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(channel.run(cancel).await, ChannelState::Closed);
        assert_eq!(channel.status().state, ChannelState::Closed);
    }
}
