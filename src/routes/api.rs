use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{calls, history, resources, session, webhooks};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Authentication middleware is applied by [`super::create_app`].
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Platform resources
        .route(
            "/api/phone-numbers",
            get(resources::list_phone_numbers).post(resources::create_phone_number),
        )
        .route(
            "/api/phone-numbers/{id}",
            patch(resources::update_phone_number).delete(resources::delete_phone_number),
        )
        .route(
            "/api/credentials",
            get(resources::list_credentials).post(resources::create_credential),
        )
        .route(
            "/api/credentials/{id}",
            get(resources::get_credential)
                .patch(resources::update_credential)
                .delete(resources::delete_credential),
        )
        .route(
            "/api/assistants",
            get(resources::list_assistants).post(resources::create_assistant),
        )
        .route(
            "/api/assistants/{id}",
            get(resources::get_assistant)
                .patch(resources::update_assistant)
                .delete(resources::delete_assistant),
        )
        .route(
            "/api/assistants/{id}/monitoring",
            post(resources::enable_assistant_monitoring),
        )
        // Calls and the monitored session
        .route("/api/calls", post(calls::create_call))
        .route("/api/calls/{id}", get(calls::get_call))
        .route(
            "/api/session",
            get(session::get_session).delete(session::stop_session),
        )
        .route("/api/session/messages", get(session::list_messages))
        .route("/api/session/frames/{id}", get(session::get_frame))
        // Diagnostics
        .route(
            "/api/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route(
            "/api/webhooks",
            get(webhooks::list_webhooks).delete(webhooks::clear_webhooks),
        )
        .layer(TraceLayer::new_for_http())
}
