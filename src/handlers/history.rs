use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::platform::ApiCallRecord;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<ApiCallRecord>,
    pub count: usize,
}

/// Recent platform requests, newest first
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let records = state.history.list(query.limit);
    Json(HistoryResponse {
        count: records.len(),
        records,
    })
}

pub async fn clear_history(State(state): State<Arc<AppState>>) -> StatusCode {
    state.history.clear();
    StatusCode::NO_CONTENT
}
