//! Live event stream route
//!
//! `GET /api/events` upgrades to a WebSocket carrying one JSON text frame per
//! call log entry. Browsers pass the API key as `?token=`.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::events_handler;
use crate::state::AppState;
use std::sync::Arc;

pub fn create_events_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/events", get(events_handler))
        .layer(TraceLayer::new_for_http())
}
