//! Monitored call session, its event log and binary frames

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::realtime::{MonitorSnapshot, RealtimeMessage};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Current session, active source and channel status.
///
/// Answers an idle snapshot when monitoring is unavailable.
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<MonitorSnapshot> {
    let snapshot = match state.monitor.as_ref() {
        Some(monitor) => monitor.snapshot(),
        None => MonitorSnapshot {
            session: None,
            mode: Default::default(),
            channel: Default::default(),
        },
    };
    Json(snapshot)
}

pub async fn stop_session(State(state): State<Arc<AppState>>) -> AppResult<StatusCode> {
    state.monitor()?.stop().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    /// Only entries with an id greater than this
    pub after: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<RealtimeMessage>,
    pub count: usize,
    pub capacity: usize,
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<MessagesResponse>> {
    let log = state.monitor()?.log();
    let mut messages = log.snapshot();
    if let Some(after) = query.after {
        messages.retain(|m| m.id > after);
    }
    Ok(Json(MessagesResponse {
        count: messages.len(),
        capacity: log.capacity(),
        messages,
    }))
}

/// Download a stored binary frame.
pub async fn get_frame(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let frame = state
        .monitor()?
        .frames()
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("frame '{id}'")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, frame.len().to_string()),
        ],
        frame,
    )
        .into_response())
}
