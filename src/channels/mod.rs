//! Outbound message delivery.

pub mod whatsapp;

use async_trait::async_trait;

use crate::error::Error;

pub use whatsapp::WhatsAppClient;

/// Delivers a text reply to a sender on the messaging platform.
///
/// Implementations make a single attempt. Failures are returned, never retried.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Channel name used in logs and errors.
    fn name(&self) -> &str;

    /// Send `body` as a plain text message to `to`.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), Error>;
}
