use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::receive_webhook;
use crate::state::AppState;
use std::sync::Arc;

/// Public webhook receiver; authenticity is checked by signature, not bearer key
pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .layer(TraceLayer::new_for_http())
}
