//! Domain newtypes and small shared value types.

use regex::Regex;
use std::sync::OnceLock;

/// Opaque identity of a sender. For SMS-style transports this is the
/// normalized phone number; for chat transports a chat id rendered as text.
/// The gateway never parses or normalizes it, equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a quota admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied,
}

/// Subscription lifecycle states as reported by the billing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Case-insensitive parse; anything unrecognized reads as `Inactive`,
    /// which lowers the tier back to the default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "cancelled" | "canceled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Inactive,
        }
    }
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[\w\-\.]+[\w\-./?=&%+#]*$").expect("valid regex"))
}

/// True when the whole trimmed input is a single http(s) URL.
pub fn is_url(text: &str) -> bool {
    url_regex().is_match(text.trim())
}
