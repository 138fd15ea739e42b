//! Configuration types.
//!
//! Everything is read from the environment once at startup and then shared
//! read-only (usually behind an `Arc`).

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;

use crate::error::ConfigError;

/// Default WhatsApp Cloud API (Graph) base URL.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v21.0";

/// Default outbound request timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(20);

const DEFAULT_PORT: u16 = 8000;

/// Operating mode: what happens to a message that passes every policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Compose a reply but never transmit it.
    #[default]
    DraftOnly,
    /// Compose and send the reply.
    Send,
}

impl Mode {
    /// Parse a mode string. Only `send` (any case) selects [`Mode::Send`];
    /// every other value falls back to draft-only.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("send") {
            Mode::Send
        } else {
            Mode::DraftOnly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::DraftOnly => "draft_only",
            Mode::Send => "send",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound WhatsApp Cloud API settings.
///
/// Credentials are optional at load time: a draft-only deployment never
/// needs them. [`WhatsAppConfig::credentials`] enforces them at send time.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub access_token: Option<SecretString>,
    pub phone_number_id: Option<String>,
    pub graph_base: String,
    pub timeout: Duration,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

impl WhatsAppConfig {
    /// Access token and phone number id, or a configuration error if either is missing.
    pub fn credentials(&self) -> Result<(&SecretString, &str), ConfigError> {
        match (&self.access_token, self.phone_number_id.as_deref()) {
            (Some(token), Some(phone_number_id)) => Ok((token, phone_number_id)),
            _ => Err(ConfigError::MissingRequired {
                key: "WHATSAPP_ACCESS_TOKEN / WHATSAPP_PHONE_NUMBER_ID".to_string(),
                hint: "Both must be set to send replies (MODE=send).".to_string(),
            }),
        }
    }

    /// Full URL of the messages endpoint for `phone_number_id`.
    pub fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/messages",
            self.graph_base.trim_end_matches('/'),
            phone_number_id
        )
    }
}

/// Process-wide relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Token the provider echoes during the webhook verification handshake.
    pub verify_token: String,
    /// Permitted sender identifiers. Empty means no restriction.
    pub allowlist: Vec<String>,
    pub mode: Mode,
    pub whatsapp: WhatsAppConfig,
    pub bind: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            allowlist: Vec::new(),
            mode: Mode::default(),
            whatsapp: WhatsAppConfig::default(),
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl RelayConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// All values are trimmed; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("WA_RELAY_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "WA_RELAY_PORT".to_string(),
                message: format!("'{raw}' is not a valid port"),
            })?,
            None => DEFAULT_PORT,
        };

        let timeout = match get("WHATSAPP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    key: "WHATSAPP_TIMEOUT_SECS".to_string(),
                    message: format!("'{raw}' is not a whole number of seconds"),
                })?,
            None => DEFAULT_SEND_TIMEOUT,
        };

        let whatsapp = WhatsAppConfig {
            access_token: get("WHATSAPP_ACCESS_TOKEN").map(SecretString::from),
            phone_number_id: get("WHATSAPP_PHONE_NUMBER_ID"),
            graph_base: get("WHATSAPP_GRAPH_BASE").unwrap_or_else(|| DEFAULT_GRAPH_BASE.to_string()),
            timeout,
        };

        Ok(Self {
            verify_token: get("WEBHOOK_VERIFY_TOKEN").unwrap_or_default(),
            allowlist: parse_allowlist(&get("ALLOWLIST_NUMBERS").unwrap_or_default()),
            mode: Mode::parse(&get("MODE").unwrap_or_default()),
            whatsapp,
            bind: get("WA_RELAY_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }

    /// Whether `sender` passes the allowlist. An empty allowlist admits everyone.
    pub fn is_allowed(&self, sender: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.iter().any(|s| s == sender)
    }
}

/// Split a comma-separated allowlist, dropping blanks.
pub fn parse_allowlist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
