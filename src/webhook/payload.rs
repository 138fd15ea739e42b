//! WhatsApp Cloud API webhook payloads and text-message extraction.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// A normalized inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender as delivered by the provider (usually digits-only).
    pub sender: String,
    pub text: String,
    /// Provider message id (`wamid.…`).
    pub message_id: String,
}

// Every field is lenient: a missing or wrongly typed field falls back to its
// default, and a list element that cannot be read drops only itself.

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default, deserialize_with = "lenient_struct")]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub messages: Vec<WhatsAppMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppMessage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub msg_type: String,
    #[serde(default, deserialize_with = "lenient_struct")]
    pub text: TextData,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: String,
}

/// Strings pass through, numbers are rendered, anything else becomes `""`.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// A list whose unreadable elements are skipped; a non-list becomes empty.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable payload element");
                None
            }
        })
        .collect())
}

/// An object that falls back to its default when it cannot be read.
fn lenient_struct<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

impl WebhookPayload {
    /// Parse a raw request body. Anything that is not a recognizable payload yields an empty one.
    pub fn from_slice(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Unparseable webhook payload, treating as empty");
                Self::default()
            }
        }
    }

    /// Flatten the payload into its text messages, in delivery order.
    ///
    /// Media, reactions, and status updates are skipped.
    pub fn text_messages(&self) -> Vec<InboundMessage> {
        self.entry
            .iter()
            .flat_map(|e| &e.changes)
            .flat_map(|c| &c.value.messages)
            .filter(|m| m.msg_type == "text")
            .map(|m| InboundMessage {
                sender: m.from.clone(),
                text: m.text.body.clone(),
                message_id: m.id.clone(),
            })
            .collect()
    }
}

/// Extract all text messages from a raw webhook body.
pub fn extract_text_messages(body: &[u8]) -> Vec<InboundMessage> {
    WebhookPayload::from_slice(body).text_messages()
}
