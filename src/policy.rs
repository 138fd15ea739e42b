//! Policy decision engine.
//!
//! Every inbound message gets exactly one [`PolicyDecision`]. Checks run in a
//! fixed precedence order:
//! 1. Allowlist: an unknown sender is blocked and nothing else is evaluated.
//! 2. Risk patterns: any match forces a draft, whatever the mode says.
//! 3. Operating mode: `send` sends, everything else drafts.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::{Mode, RelayConfig};

/// What the responder should do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Draft,
    Send,
    Block,
}

/// Outcome of [`decide`] for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub action: Action,
    /// Human-readable reasons, in evaluation order.
    pub reasons: Vec<String>,
}

impl PolicyDecision {
    /// Whether any reason comes from a risk pattern match.
    pub fn is_risk_flagged(&self) -> bool {
        is_risk_flagged(&self.reasons)
    }

    fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            action: Action::Block,
            reasons: vec![reason.into()],
        }
    }
}

/// Prefix of every reason produced by a risk pattern match.
pub const RISK_REASON_PREFIX: &str = "matched risk pattern: ";

/// Broad family a risk pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    PromptInjection,
    CredentialExfiltration,
    SuspiciousLink,
}

/// A fixed heuristic matched against lower-cased message text.
#[derive(Debug)]
pub struct RiskPattern {
    /// Source regex, surfaced verbatim in decision reasons.
    pub pattern: &'static str,
    pub category: RiskCategory,
    regex: Regex,
}

impl RiskPattern {
    fn new(pattern: &'static str, category: RiskCategory) -> Self {
        Self {
            pattern,
            category,
            regex: Regex::new(pattern).expect("built-in risk pattern must compile"),
        }
    }

    /// Reason string recorded when this pattern matches.
    pub fn reason(&self) -> String {
        format!("{RISK_REASON_PREFIX}{}", self.pattern)
    }

    pub fn is_match(&self, lowered: &str) -> bool {
        self.regex.is_match(lowered)
    }
}

/// Built-in risk patterns, in evaluation order.
pub static RISK_PATTERNS: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    use RiskCategory::*;
    vec![
        RiskPattern::new(
            r"ignore (all|any) (previous|prior) instructions",
            PromptInjection,
        ),
        RiskPattern::new(r"system prompt", PromptInjection),
        RiskPattern::new(r"developer message", PromptInjection),
        RiskPattern::new(
            r"reveal (secrets|tokens|keys|credentials)",
            CredentialExfiltration,
        ),
        RiskPattern::new(
            r"send (me|us) your (token|api key|password)",
            CredentialExfiltration,
        ),
        RiskPattern::new(r"click (this|the) link", SuspiciousLink),
        RiskPattern::new(r"download (this|the) file", SuspiciousLink),
    ]
});

/// Whether `reasons` include a risk pattern match.
pub fn is_risk_flagged(reasons: &[String]) -> bool {
    reasons.iter().any(|r| r.starts_with(RISK_REASON_PREFIX))
}

/// Every risk pattern matching `text`, in pattern order.
pub fn risk_matches(text: &str) -> Vec<&'static RiskPattern> {
    let lowered = text.to_lowercase();
    RISK_PATTERNS
        .iter()
        .filter(|p| p.is_match(&lowered))
        .collect()
}

/// Decide what to do with a message from `sender` (already normalized).
pub fn decide(sender: &str, text: &str, config: &RelayConfig) -> PolicyDecision {
    if !config.is_allowed(sender) {
        debug!(sender = %sender, "Sender not in allowlist");
        return PolicyDecision::block("sender not in allowlist");
    }

    let matches = risk_matches(text);
    if !matches.is_empty() {
        debug!(
            sender = %sender,
            matched = matches.len(),
            categories = ?matches.iter().map(|p| p.category).collect::<Vec<_>>(),
            "Message matched risk patterns, forcing draft"
        );
        return PolicyDecision {
            allowed: true,
            action: Action::Draft,
            reasons: matches.iter().map(|p| p.reason()).collect(),
        };
    }

    let action = match config.mode {
        Mode::Send => Action::Send,
        Mode::DraftOnly => Action::Draft,
    };
    PolicyDecision {
        allowed: true,
        action,
        reasons: vec![format!("mode={}", config.mode)],
    }
}
