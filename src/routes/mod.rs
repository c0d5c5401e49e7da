pub mod api;
pub mod events;
pub mod webhooks;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Assemble every route with authentication applied to the protected ones.
///
/// Transport layers (CORS, rate limiting, security headers) are added by the
/// binary.
pub fn create_app(state: Arc<AppState>) -> Router {
    let protected_routes = api::create_api_router()
        .merge(events::create_events_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public_routes = Router::new()
        .route("/", get(health_check))
        .merge(webhooks::create_webhook_router());

    public_routes.merge(protected_routes).with_state(state)
}
