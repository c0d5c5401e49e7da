//! Live event stream
//!
//! `GET /api/events` upgrades to a WebSocket and forwards every new entry of
//! the monitor's log as a JSON text frame. Slow clients skip entries rather
//! than stall the monitor; a `lagged` notice tells them how many.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::core::realtime::RealtimeMessage;
use crate::errors::app_error::AppResult;
use crate::state::AppState;

/// Client frames are control only; keep them small.
const MAX_WS_MESSAGE_SIZE: usize = 64 * 1024;

pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> AppResult<Response> {
    let events = state.monitor()?.subscribe();
    info!("Event stream connection upgrade requested");

    Ok(ws
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| stream_events(socket, events)))
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<RealtimeMessage>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let text = match event {
                    Ok(message) => match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize log entry");
                            continue;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream client lagging");
                        json!({ "type": "lagged", "skipped": skipped }).to_string()
                    }
                    Err(RecvError::Closed) => break,
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "Event stream receive error");
                        break;
                    }
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    info!("Event stream connection closed");
}
