//! Sender identity normalization.
//!
//! Webhook `from` fields are usually digits-only (`14155551234`) while an
//! allowlist is typically written in E.164 (`+14155551234`). Only the North
//! American `1` country code is recognized; every other shape passes through
//! untouched. Allowlist entries for other regions must be written exactly as
//! the provider delivers them.

/// Normalize a sender identifier for allowlist comparison.
pub fn normalize_sender(raw: &str) -> String {
    let n = raw.trim();
    if n.starts_with('+') {
        return n.to_string();
    }
    if n.len() == 11 && n.starts_with('1') && n.bytes().all(|b| b.is_ascii_digit()) {
        return format!("+{n}");
    }
    n.to_string()
}
