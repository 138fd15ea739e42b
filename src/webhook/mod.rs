//! Inbound webhook surface: payload extraction and HTTP routes.

pub mod payload;
pub mod routes;

pub use payload::{InboundMessage, WebhookPayload, extract_text_messages};
pub use routes::relay_routes;
