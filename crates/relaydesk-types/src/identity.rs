use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Stable per-visitor key, unique across all sessions.
///
/// Derived from the visitor's chosen display name via [`VisitorIdentity::derive`].
/// Two visitors who pick the same display name resolve to the same identity
/// and therefore the same session; the newer connection takes over delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorIdentity(pub String);

impl VisitorIdentity {
    /// Derive an identity from a visitor's display name.
    ///
    /// Rules:
    /// - Lowercase
    /// - Replace non-alphanumeric characters with hyphens
    /// - Collapse consecutive hyphens into one
    /// - Trim leading/trailing hyphens
    /// - An empty result falls back to `"guest"`
    ///
    /// # Examples
    ///
    /// ```
    /// use relaydesk_types::identity::VisitorIdentity;
    ///
    /// assert_eq!(VisitorIdentity::derive("Ana Lee").as_str(), "ana-lee");
    /// assert_eq!(VisitorIdentity::derive("  Bob!  ").as_str(), "bob");
    /// assert_eq!(VisitorIdentity::derive("???").as_str(), "guest");
    /// ```
    pub fn derive(display_name: &str) -> Self {
        let lowered: String = display_name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();

        // Collapse consecutive hyphens and trim edges
        let mut result = String::with_capacity(lowered.len());
        let mut prev_was_hyphen = true; // treat start as hyphen to trim leading
        for c in lowered.chars() {
            if c == '-' {
                if !prev_was_hyphen {
                    result.push('-');
                }
                prev_was_hyphen = true;
            } else {
                result.push(c);
                prev_was_hyphen = false;
            }
        }

        if result.ends_with('-') {
            result.pop();
        }

        if result.is_empty() {
            result.push_str("guest");
        }

        Self(result)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VisitorIdentity {
    type Err = std::convert::Infallible;

    /// Parses an identity verbatim. Identities received on the wire (operator
    /// commands echo back identities the relay announced) are exact keys and
    /// are never re-normalized.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Unique identifier for a single transport connection, wrapping a UUID v7
/// (time-sortable).
///
/// Minted once per WebSocket connection. A visitor who reconnects gets a new
/// ConnectionId under the same VisitorIdentity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
