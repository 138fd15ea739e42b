//! Turns a policy decision into a reply.
//!
//! Drafts are placeholders: they echo the message back and ask for
//! confirmation before anything automated happens.

use std::sync::Arc;

use tracing::info;

use crate::channels::OutboundSender;
use crate::error::Error;
use crate::policy::{Action, PolicyDecision, is_risk_flagged};
use crate::webhook::InboundMessage;

/// What the responder did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Blocked; nothing was composed.
    Skipped,
    /// Draft composed, not transmitted.
    Drafted(String),
    /// Draft composed and handed to the outbound sender.
    Sent(String),
}

/// Build the placeholder draft reply for `text`.
///
/// Risk-flagged reasons change the lead line so the draft says why it was held.
pub fn build_draft_reply(text: &str, reasons: &[String]) -> String {
    let mut draft = if is_risk_flagged(reasons) {
        String::from("Draft-only: I received your message, but flagged it as potentially risky.\n")
    } else {
        String::from("Draft-only: got it. ✅\n")
    };
    draft.push_str(&format!("You said: {text}\n"));
    if reasons.is_empty() {
        draft.push_str("Reply with 'CONFIRM' if you want me to send an automated response.");
    } else {
        draft.push_str(&format!("Reasons: {}\n", reasons.join(", ")));
        draft.push_str("If you want me to act on it, confirm explicitly.");
    }
    draft
}

/// Applies decisions, sending through an [`OutboundSender`] when told to.
pub struct Responder {
    sender: Arc<dyn OutboundSender>,
}

impl Responder {
    pub fn new(sender: Arc<dyn OutboundSender>) -> Self {
        Self { sender }
    }

    /// Act on `decision` for `message`.
    ///
    /// Send failures are returned to the caller; there is no retry.
    pub async fn respond(
        &self,
        message: &InboundMessage,
        decision: &PolicyDecision,
    ) -> Result<Reply, Error> {
        match decision.action {
            Action::Block => Ok(Reply::Skipped),
            Action::Draft => {
                let draft = build_draft_reply(&message.text, &decision.reasons);
                info!(
                    message_id = %message.message_id,
                    draft_len = draft.len(),
                    "Draft composed (not sent)"
                );
                Ok(Reply::Drafted(draft))
            }
            Action::Send => {
                let draft = build_draft_reply(&message.text, &decision.reasons);
                // Reply to the identifier exactly as the provider delivered it.
                self.sender.send_text(&message.sender, &draft).await?;
                info!(
                    message_id = %message.message_id,
                    channel = self.sender.name(),
                    "Reply sent"
                );
                Ok(Reply::Sent(draft))
            }
        }
    }
}
