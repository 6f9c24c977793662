//! Visitor session and presence types.
//!
//! A `VisitorSession` is the durable conversation state for one identity.
//! Presence is an explicit three-state machine rather than a boolean flag,
//! so "was connected and dropped" and "was closed and purged" are distinct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::identity::VisitorIdentity;
use crate::transcript::TranscriptLine;

/// Presence state of a visitor session.
///
/// Legal transitions:
/// - `Disconnected -> Connected` (identify)
/// - `Connected -> Disconnected` (transport close; session retained)
/// - `Disconnected -> Closed`, `Connected -> Closed` (explicit close; terminal)
///
/// `Closed` is terminal and never persisted: the archival path purges the
/// session in the same operation that closes it.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (state IN ('disconnected', 'connected'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Disconnected,
    Connected,
    Closed,
}

impl PresenceState {
    /// Whether the transition `self -> to` is legal.
    pub fn can_transition(self, to: PresenceState) -> bool {
        matches!(
            (self, to),
            (PresenceState::Disconnected, PresenceState::Connected)
                | (PresenceState::Connected, PresenceState::Disconnected)
                | (PresenceState::Disconnected, PresenceState::Closed)
                | (PresenceState::Connected, PresenceState::Closed)
        )
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceState::Disconnected => write!(f, "disconnected"),
            PresenceState::Connected => write!(f, "connected"),
            PresenceState::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for PresenceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disconnected" => Ok(PresenceState::Disconnected),
            "connected" => Ok(PresenceState::Connected),
            "closed" => Ok(PresenceState::Closed),
            other => Err(format!("invalid presence state: '{other}'")),
        }
    }
}

impl Default for PresenceState {
    fn default() -> Self {
        PresenceState::Disconnected
    }
}

/// Durable conversation state for one visitor identity.
///
/// Exactly one session exists per identity. The live transport connection is
/// tracked by the relay layer, never here; `state` only says whether one
/// currently exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorSession {
    pub identity: VisitorIdentity,
    /// The visitor's chosen name as typed (identity is the normalized form).
    pub display_name: String,
    /// Set once a visitor message carries an email; later messages may update it.
    pub contact_email: Option<String>,
    /// Ordered transcript, append-only while the session lives.
    pub history: Vec<TranscriptLine>,
    pub state: PresenceState,
    pub started_at: DateTime<Utc>,
    /// Updated on every event that touches the session.
    pub last_active: DateTime<Utc>,
}

impl VisitorSession {
    /// Create a fresh session in `Disconnected` state. The relay transitions
    /// it to `Connected` as part of identify, so creation also goes through
    /// the transition guard.
    pub fn new(identity: VisitorIdentity, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            identity,
            display_name,
            contact_email: None,
            history: Vec::new(),
            state: PresenceState::Disconnected,
            started_at: now,
            last_active: now,
        }
    }

    /// Apply a presence transition, rejecting illegal ones.
    pub fn transition(&mut self, to: PresenceState) -> Result<(), String> {
        if !self.state.can_transition(to) {
            return Err(format!(
                "illegal presence transition for '{}': {} -> {}",
                self.identity, self.state, to
            ));
        }
        self.state = to;
        Ok(())
    }
}

/// Snapshot written to the archive when a session is closed.
///
/// Self-contained: carries everything needed to read the conversation after
/// the session itself has been purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArchive {
    pub identity: VisitorIdentity,
    pub display_name: String,
    pub contact_email: Option<String>,
    pub closed_at: DateTime<Utc>,
    pub history: Vec<TranscriptLine>,
}

impl SessionArchive {
    /// Build an archive from a session about to be closed.
    pub fn from_session(session: &VisitorSession, closed_at: DateTime<Utc>) -> Self {
        Self {
            identity: session.identity.clone(),
            display_name: session.display_name.clone(),
            contact_email: session.contact_email.clone(),
            closed_at,
            history: session.history.clone(),
        }
    }

    /// Deterministic artifact name: `{identity}_{colon-free UTC timestamp}`.
    ///
    /// The closing timestamp is part of the name, so re-closing a session
    /// that survived a crash between archive write and purge yields a second
    /// artifact instead of clobbering the first.
    pub fn artifact_stem(&self) -> String {
        format!(
            "{}_{}",
            self.identity,
            self.closed_at.format("%Y-%m-%dT%H-%M-%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{LinePayload, SpeakerRole};
    use chrono::TimeZone;

    #[test]
    fn test_presence_state_roundtrip() {
        for state in [
            PresenceState::Disconnected,
            PresenceState::Connected,
            PresenceState::Closed,
        ] {
            let s = state.to_string();
            let parsed: PresenceState = s.parse().unwrap();
            assert_eq!(state, parsed);
        }
    }

    #[test]
    fn test_presence_state_default() {
        assert_eq!(PresenceState::default(), PresenceState::Disconnected);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(PresenceState::Disconnected.can_transition(PresenceState::Connected));
        assert!(PresenceState::Connected.can_transition(PresenceState::Disconnected));
        assert!(PresenceState::Disconnected.can_transition(PresenceState::Closed));
        assert!(PresenceState::Connected.can_transition(PresenceState::Closed));
    }

    #[test]
    fn test_closed_is_terminal() {
        assert!(!PresenceState::Closed.can_transition(PresenceState::Connected));
        assert!(!PresenceState::Closed.can_transition(PresenceState::Disconnected));
        assert!(!PresenceState::Closed.can_transition(PresenceState::Closed));
    }

    #[test]
    fn test_no_self_transitions() {
        assert!(!PresenceState::Connected.can_transition(PresenceState::Connected));
        assert!(!PresenceState::Disconnected.can_transition(PresenceState::Disconnected));
    }

    #[test]
    fn test_session_transition_guard() {
        let mut session =
            VisitorSession::new(VisitorIdentity::derive("Ana"), "Ana".to_string());
        assert_eq!(session.state, PresenceState::Disconnected);

        session.transition(PresenceState::Connected).unwrap();
        assert_eq!(session.state, PresenceState::Connected);

        // Connected -> Connected is illegal
        assert!(session.transition(PresenceState::Connected).is_err());

        session.transition(PresenceState::Closed).unwrap();
        assert!(session.transition(PresenceState::Connected).is_err());
    }

    #[test]
    fn test_archive_carries_full_history() {
        let mut session =
            VisitorSession::new(VisitorIdentity::derive("Ana"), "Ana".to_string());
        session.history.push(TranscriptLine::new(
            SpeakerRole::Visitor,
            LinePayload::Text("hola".to_string()),
        ));
        session.history.push(TranscriptLine::new(
            SpeakerRole::Operator,
            LinePayload::Text("hola ana".to_string()),
        ));

        let archive = SessionArchive::from_session(&session, Utc::now());
        assert_eq!(archive.history.len(), 2);
        assert_eq!(archive.history, session.history);
        assert_eq!(archive.identity, session.identity);
    }

    #[test]
    fn test_artifact_stem_is_deterministic_and_colon_free() {
        let session =
            VisitorSession::new(VisitorIdentity::derive("Ana"), "Ana".to_string());
        let closed_at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 45).unwrap();
        let archive = SessionArchive::from_session(&session, closed_at);

        assert_eq!(archive.artifact_stem(), "ana_2024-03-15T10-30-45");
        assert!(!archive.artifact_stem().contains(':'));
    }

    #[test]
    fn test_session_serde_roundtrip() {
        let session =
            VisitorSession::new(VisitorIdentity::derive("Ana"), "Ana".to_string());
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"state\":\"disconnected\""));
        let parsed: VisitorSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.identity, session.identity);
    }
}
