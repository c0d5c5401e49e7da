use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::core::platform::{Call, CreateCallRequest};
use crate::core::realtime::CallSession;
use crate::errors::app_error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateCallResponse {
    pub call: Call,
    pub session: CallSession,
}

/// Place an outbound call and start monitoring it.
///
/// Missing assistant, phone number or customer number answer 400 before
/// anything is sent to the platform.
pub async fn create_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCallRequest>,
) -> AppResult<(StatusCode, Json<CreateCallResponse>)> {
    request.validate()?;

    let platform = state.platform()?;
    let monitor = state.monitor()?;

    let call = platform.create_call(&request).await?;
    info!(
        call_id = %call.id,
        has_listen_url = call.listen_url().is_some(),
        "Outbound call created"
    );

    let session = monitor.start(&call).await?;
    Ok((StatusCode::CREATED, Json(CreateCallResponse { call, session })))
}

pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Call>> {
    let call = state.platform()?.get_call(&id).await?;
    Ok(Json(call))
}
