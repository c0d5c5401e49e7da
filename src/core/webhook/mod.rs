//! Inbound webhook log.
//!
//! The platform posts server-to-server notifications (status updates,
//! end-of-call reports, tool calls) to the dashboard. They are kept in a
//! bounded ring buffer for inspection; signature verification is advisory
//! and never rejects a delivery.

mod signature;
mod store;

pub use signature::{SignatureError, sign, verify_signature};
pub use store::{DEFAULT_LIST_LIMIT, WEBHOOK_CAPACITY, WebhookEvent, WebhookPayload, WebhookStore};
