//! Call Monitor Tests
//!
//! End-to-end behaviour of `CallMonitor`: a wiremock server plays the
//! platform REST API and a local tokio-tungstenite server plays the realtime
//! listen endpoint.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waav_dialer::core::platform::{Call, PlatformClient, PlatformConfig};
use tokio_util::sync::CancellationToken;
use waav_dialer::core::realtime::{
    CallMonitor, CallStatus, ChannelManager, ChannelState, EventNormalizer, FrameStore,
    MAX_RECONNECT_ATTEMPTS, MessageKind, MessageLog, MessagePayload, MessageSource, MonitorConfig,
    MonitorMode, RealtimeMessage, ReconnectionConfig, SessionTracker,
};

const WAIT: Duration = Duration::from_secs(5);

/// Non-text bytes, classified as a binary frame
const AUDIO_FRAME: [u8; 8] = [0x00, 0x01, 0xfe, 0xff, 0x02, 0x80, 0x81, 0x03];

fn monitor_for(server: &MockServer, config: MonitorConfig) -> CallMonitor {
    let client = PlatformClient::new(PlatformConfig::new(server.uri(), "sk-test")).unwrap();
    CallMonitor::new(Arc::new(client), config)
}

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(50),
        reconnection: ReconnectionConfig {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: 10,
            connect_timeout_ms: 200,
        },
        ..Default::default()
    }
}

fn call(value: serde_json::Value) -> Call {
    serde_json::from_value(value).unwrap()
}

/// Serve one realtime connection: a status update, an audio frame, then
/// hold the socket open until the client closes it.
async fn spawn_listen_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();

        let update = json!({"type": "status-update", "status": "in-progress"});
        write
            .send(Message::Text(update.to_string().into()))
            .await
            .unwrap();
        write
            .send(Message::Binary(AUDIO_FRAME.to_vec().into()))
            .await
            .unwrap();

        while let Some(Ok(msg)) = read.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    format!("ws://{addr}/listen")
}

/// Accepts TCP connections but never completes a WebSocket handshake.
async fn spawn_silent_listener() -> (String, Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });

    (format!("ws://{addr}/listen"), accepted)
}

async fn next_matching<F>(
    events: &mut broadcast::Receiver<RealtimeMessage>,
    mut predicate: F,
) -> RealtimeMessage
where
    F: FnMut(&RealtimeMessage) -> bool,
{
    timeout(WAIT, async {
        loop {
            let message = events.recv().await.unwrap();
            if predicate(&message) {
                return message;
            }
        }
    })
    .await
    .expect("expected log entry was not appended in time")
}

#[tokio::test]
async fn test_listen_url_opens_channel_without_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call/call-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let listen_url = spawn_listen_server().await;
    let monitor = monitor_for(&server, fast_config());
    let mut events = monitor.subscribe();

    monitor
        .start(&call(json!({
            "id": "call-1",
            "status": "queued",
            "monitor": {"listenUrl": listen_url}
        })))
        .await
        .unwrap();
    assert_eq!(monitor.mode(), MonitorMode::Channel);

    let binary = next_matching(&mut events, |m| {
        matches!(m.payload, MessagePayload::Binary { .. })
    })
    .await;
    let MessagePayload::Binary { locator, size_bytes } = binary.payload else {
        unreachable!()
    };
    assert_eq!(size_bytes, AUDIO_FRAME.len());
    assert_eq!(
        monitor.frames().get(&locator).as_deref(),
        Some(&AUDIO_FRAME[..])
    );

    let session = monitor.session().unwrap();
    assert_eq!(session.status, CallStatus::InProgress);
    assert!(monitor.channel_status().connected());

    let log = monitor.log().snapshot();
    assert!(log.iter().all(|m| m.source != MessageSource::Poller));
    assert!(log.iter().any(|m| {
        m.kind == MessageKind::Message
            && m.payload.as_json().and_then(|v| v.get("type")) == Some(&json!("status-update"))
    }));

    monitor.stop().await.unwrap();
    assert_eq!(monitor.mode(), MonitorMode::Idle);
    assert_eq!(monitor.channel_status().state, ChannelState::Closed);
}

#[tokio::test]
async fn test_poller_switches_to_channel_when_listen_url_appears() {
    let server = MockServer::start().await;
    let listen_url = spawn_listen_server().await;

    Mock::given(method("GET"))
        .and(path("/call/call-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "call-2", "status": "ringing"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/call/call-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "call-2",
            "status": "in-progress",
            "monitor": {"listenUrl": listen_url}
        })))
        .mount(&server)
        .await;

    let monitor = monitor_for(&server, fast_config());
    let mut events = monitor.subscribe();
    monitor
        .start(&call(json!({"id": "call-2", "status": "queued"})))
        .await
        .unwrap();
    assert_eq!(monitor.mode(), MonitorMode::Polling);

    next_matching(&mut events, |m| {
        m.kind == MessageKind::Connection && m.payload == MessagePayload::text("realtime channel connected")
    })
    .await;
    assert_eq!(monitor.mode(), MonitorMode::Channel);

    let polls = monitor
        .log()
        .snapshot()
        .into_iter()
        .filter(|m| m.kind == MessageKind::Poll && m.payload.as_json().is_some())
        .count();
    assert_eq!(polls, 2);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_poller_stops_on_ended_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call/call-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "call-3",
            "status": "ended",
            "endedReason": "customer-ended-call",
            "cost": 0.12
        })))
        .expect(1)
        .mount(&server)
        .await;

    let monitor = monitor_for(&server, fast_config());
    monitor
        .start(&call(json!({"id": "call-3", "status": "queued"})))
        .await
        .unwrap();

    timeout(WAIT, monitor.finished()).await.unwrap();
    assert_eq!(monitor.mode(), MonitorMode::Idle);

    let session = monitor.session().unwrap();
    assert_eq!(session.status, CallStatus::Ended);
    assert_eq!(session.ended_reason.as_deref(), Some("customer-ended-call"));

    let log = monitor.log().snapshot();
    assert!(log.iter().all(|m| m.source != MessageSource::RealtimeChannel));
}

#[tokio::test]
async fn test_connect_timeout_logs_error_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call/call-4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "call-4", "status": "ended"})),
        )
        .mount(&server)
        .await;

    let (listen_url, _accepted) = spawn_silent_listener().await;
    let monitor = monitor_for(&server, fast_config());
    let mut events = monitor.subscribe();

    monitor
        .start(&call(json!({
            "id": "call-4",
            "monitor": {"listenUrl": listen_url}
        })))
        .await
        .unwrap();

    let first_error = next_matching(&mut events, |m| m.kind == MessageKind::Error).await;
    let MessagePayload::Text(reason) = &first_error.payload else {
        panic!("error entry should be text");
    };
    assert!(reason.contains("timed out"));

    let retry = next_matching(&mut events, |m| {
        matches!(&m.payload, MessagePayload::Text(t) if t.starts_with("reconnecting in"))
    })
    .await;
    assert_eq!(retry.kind, MessageKind::Connection);
    assert_eq!(monitor.channel_status().retry_count, 1);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_retries_are_bounded_then_falls_back_to_polling() {
    use std::sync::atomic::Ordering;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call/call-5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "call-5", "status": "ended"})),
        )
        .mount(&server)
        .await;

    let (listen_url, accepted) = spawn_silent_listener().await;
    let monitor = monitor_for(&server, fast_config());

    monitor
        .start(&call(json!({
            "id": "call-5",
            "monitor": {"listenUrl": listen_url}
        })))
        .await
        .unwrap();

    timeout(WAIT, monitor.finished()).await.unwrap();

    let channel = monitor.channel_status();
    assert_eq!(channel.state, ChannelState::Failed);
    assert_eq!(channel.retry_count, MAX_RECONNECT_ATTEMPTS);
    // Initial attempt plus one per retry
    assert_eq!(
        accepted.load(Ordering::SeqCst),
        1 + MAX_RECONNECT_ATTEMPTS as usize
    );

    let log = monitor.log().snapshot();
    let timeouts = log
        .iter()
        .filter(|m| {
            m.kind == MessageKind::Error
                && matches!(&m.payload, MessagePayload::Text(t) if t.contains("timed out"))
        })
        .count();
    assert_eq!(timeouts, 1 + MAX_RECONNECT_ATTEMPTS as usize);
    assert!(log.iter().any(|m| {
        matches!(&m.payload, MessagePayload::Text(t) if t.starts_with("giving up"))
    }));
    assert!(log.iter().any(|m| {
        m.source == MessageSource::Monitor
            && matches!(&m.payload, MessagePayload::Text(t) if t.contains("falling back to polling"))
    }));
    assert!(log.iter().any(|m| m.source == MessageSource::Poller));
    assert_eq!(monitor.session().unwrap().status, CallStatus::Ended);
}

#[tokio::test]
async fn test_new_call_replaces_previous_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "call-6", "status": "ringing"})),
        )
        .mount(&server)
        .await;

    let monitor = monitor_for(&server, fast_config());
    monitor
        .start(&call(json!({"id": "call-6"})))
        .await
        .unwrap();
    monitor
        .start(&call(json!({"id": "call-7"})))
        .await
        .unwrap();

    assert_eq!(monitor.session().unwrap().id, "call-7");
    let log = monitor.log().snapshot();
    assert!(!log.iter().any(|m| {
        matches!(&m.payload, MessagePayload::Text(t) if t.contains("call-6"))
    }));

    monitor.stop().await.unwrap();
    assert!(monitor.session().is_none());
}

#[tokio::test]
async fn test_attach_fetches_call_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call/call-8"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "call-8", "status": "ended"})),
        )
        .mount(&server)
        .await;

    let monitor = monitor_for(&server, fast_config());
    let session = monitor.attach("call-8").await.unwrap();
    assert_eq!(session.id, "call-8");
    assert_eq!(session.status, CallStatus::Ended);

    timeout(WAIT, monitor.finished()).await.unwrap();
}

fn channel_for(url: &str, log: Arc<MessageLog>) -> ChannelManager {
    ChannelManager::new(
        url,
        log,
        SessionTracker::new(),
        EventNormalizer::new(FrameStore::new(16)),
    )
    .unwrap()
    .with_reconnection(ReconnectionConfig {
        max_attempts: MAX_RECONNECT_ATTEMPTS,
        base_delay_ms: 10,
        connect_timeout_ms: 500,
    })
}

fn text_of(message: &RealtimeMessage) -> Option<&str> {
    match &message.payload {
        MessagePayload::Text(t) => Some(t.as_str()),
        _ => None,
    }
}

#[tokio::test]
async fn test_remote_close_ends_channel_without_retry() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Close(None)).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    let log = Arc::new(MessageLog::new(50));
    let channel = channel_for(&format!("ws://{addr}/listen"), log.clone());

    let state = timeout(WAIT, channel.run(CancellationToken::new()))
        .await
        .unwrap();
    assert_eq!(state, ChannelState::Closed);
    assert_eq!(channel.status().state, ChannelState::Closed);
    assert_eq!(channel.status().retry_count, 0);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    let entries = log.snapshot();
    assert!(
        !entries
            .iter()
            .any(|m| text_of(m).is_some_and(|t| t.starts_with("reconnecting")))
    );
    assert!(!entries.iter().any(|m| m.kind == MessageKind::Error));
    assert!(
        entries
            .iter()
            .any(|m| text_of(m) == Some("channel closed by remote"))
    );
}

#[tokio::test]
async fn test_dropped_connection_reconnects_and_resets_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection is dropped right after the handshake
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let log = Arc::new(MessageLog::new(50));
    let mut events = log.subscribe();
    let channel = Arc::new(channel_for(&format!("ws://{addr}/listen"), log.clone()));
    let cancel = CancellationToken::new();
    let runner = channel.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { runner.run(token).await });

    next_matching(&mut events, |m| {
        text_of(m) == Some("realtime channel connected")
    })
    .await;
    let lost = next_matching(&mut events, |m| m.kind == MessageKind::Error).await;
    assert!(text_of(&lost).is_some_and(|t| t.starts_with("connection lost")));
    next_matching(&mut events, |m| {
        text_of(m).is_some_and(|t| t.starts_with("reconnecting in"))
    })
    .await;
    next_matching(&mut events, |m| {
        text_of(m) == Some("realtime channel connected")
    })
    .await;

    let status = channel.status();
    assert_eq!(status.state, ChannelState::Connected);
    assert_eq!(status.retry_count, 0);

    cancel.cancel();
    let state = timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(state, ChannelState::Closed);
}
