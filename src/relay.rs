//! Per-request processing: normalize, decide, respond.

use std::sync::Arc;

use tracing::{error, info};

use crate::channels::OutboundSender;
use crate::config::RelayConfig;
use crate::error::Error;
use crate::normalize::normalize_sender;
use crate::policy::decide;
use crate::responder::{Reply, Responder};
use crate::webhook::InboundMessage;

/// Per-message outcomes of one webhook batch, in delivery order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub outcomes: Vec<Result<Reply, Error>>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Messages whose handling returned an error.
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    /// Messages whose reply went out.
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Ok(Reply::Sent(_))))
            .count()
    }
}

/// Stateless relay pipeline shared by all requests.
pub struct Relay {
    config: Arc<RelayConfig>,
    responder: Responder,
}

impl Relay {
    pub fn new(config: Arc<RelayConfig>, sender: Arc<dyn OutboundSender>) -> Self {
        Self {
            config,
            responder: Responder::new(sender),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Decide on and respond to a single message.
    pub async fn handle(&self, message: &InboundMessage) -> Result<Reply, Error> {
        let sender = normalize_sender(&message.sender);
        let decision = decide(&sender, &message.text, &self.config);
        info!(
            message_id = %message.message_id,
            sender = %sender,
            action = ?decision.action,
            reasons = ?decision.reasons,
            "Policy decision"
        );
        self.responder.respond(message, &decision).await
    }

    /// Handle every message in order.
    ///
    /// A failure is logged and does not stop the rest of the batch.
    pub async fn process(&self, messages: &[InboundMessage]) -> BatchOutcome {
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            let outcome = self.handle(message).await;
            if let Err(ref e) = outcome {
                error!(
                    message_id = %message.message_id,
                    error = %e,
                    "Failed to act on inbound message"
                );
            }
            outcomes.push(outcome);
        }
        BatchOutcome { outcomes }
    }
}
