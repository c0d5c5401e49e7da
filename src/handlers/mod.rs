//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `calls` - Outbound call creation and lookup
//! - `events` - WebSocket stream of the call event log
//! - `history` - Platform request history
//! - `resources` - Phone numbers, credentials and assistants
//! - `session` - Monitored call session, messages and frames
//! - `webhooks` - Inbound platform webhooks

pub mod api;
pub mod calls;
pub mod events;
pub mod history;
pub mod resources;
pub mod session;
pub mod webhooks;

pub use events::events_handler;
pub use webhooks::receive_webhook;
