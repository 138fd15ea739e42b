//! WhatsApp channel — sends text replies through the Cloud API (Graph).

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::OutboundSender;
use crate::config::WhatsAppConfig;
use crate::error::{ChannelError, Error};

const CHANNEL_NAME: &str = "whatsapp";

/// Body of a `POST /{phone_number_id}/messages` text send.
#[derive(Debug, Serialize)]
pub struct OutgoingTextMessage<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub text: OutgoingText<'a>,
}

#[derive(Debug, Serialize)]
pub struct OutgoingText<'a> {
    pub body: &'a str,
}

impl<'a> OutgoingTextMessage<'a> {
    pub fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            msg_type: "text",
            text: OutgoingText { body },
        }
    }
}

/// Cloud API client for outbound text messages.
pub struct WhatsAppClient {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppClient {
    /// Build a client whose every request carries the configured timeout.
    pub fn new(config: WhatsAppConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl OutboundSender for WhatsAppClient {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<(), Error> {
        let (token, phone_number_id) = self.config.credentials()?;
        let url = self.config.messages_url(phone_number_id);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .json(&OutgoingTextMessage::new(to, body))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let err_body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %err_body, "WhatsApp send rejected");
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("messages API returned {status}: {err_body}"),
            }
            .into());
        }

        debug!(to = %to, status = %status, "WhatsApp message sent");
        Ok(())
    }
}
