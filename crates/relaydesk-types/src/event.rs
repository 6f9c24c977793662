//! Wire event vocabulary for the Relaydesk WebSocket protocol.
//!
//! `ClientCommand` is what connections send in; `RelayEvent` is what the
//! relay sends out. Both are JSON text frames with an internal `type` tag.
//! All outbound variants are Clone so one event can fan out to many
//! connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::identity::VisitorIdentity;
use crate::transcript::TranscriptLine;

/// Role a connection declares when it identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    Visitor,
    Operator,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRole::Visitor => write!(f, "visitor"),
            ClientRole::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for ClientRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visitor" => Ok(ClientRole::Visitor),
            "operator" => Ok(ClientRole::Operator),
            other => Err(format!("invalid client role: '{other}'")),
        }
    }
}

/// Incoming command from a WebSocket client.
///
/// Clients send JSON-encoded text frames matching one of these variants.
/// Unknown or malformed messages are logged and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Declare this connection's role. Visitors supply a display name, from
    /// which their identity is derived; operators need no identity.
    Identify {
        role: ClientRole,
        name: Option<String>,
    },

    /// A chat message from an identified visitor connection.
    VisitorMessage {
        text: String,
        email: Option<String>,
    },

    /// An operator reply targeted at one visitor identity.
    OperatorReply {
        identity: VisitorIdentity,
        text: String,
    },

    /// A file pushed by an operator to one visitor identity. Bounded by the
    /// configured decoded-size limit.
    OperatorFile {
        identity: VisitorIdentity,
        file_name: String,
        file_base64: String,
    },

    /// Close a visitor's session: archive the transcript, then purge.
    OperatorClose { identity: VisitorIdentity },

    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// Operator-facing projection of a session, used by `visitor_connected` and
/// `initial_session_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub identity: VisitorIdentity,
    pub display_name: String,
    pub contact_email: Option<String>,
    pub history: Vec<TranscriptLine>,
    pub connected: bool,
}

/// Outgoing event from the relay to a WebSocket client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A visitor message, fanned out to the operator group.
    MessageDelivered {
        identity: VisitorIdentity,
        display_name: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// An operator reply, delivered to the target visitor connection.
    ReplyDelivered { text: String },

    /// An operator file push, delivered to the live visitor connection only.
    /// The payload never enters the durable store.
    FileDelivered {
        file_name: String,
        file_base64: String,
    },

    /// Full ordered history, sent once to a reconnecting visitor connection.
    HistoryReplay { lines: Vec<TranscriptLine> },

    /// Presence counters, fanned out to the operator group.
    PresenceUpdate {
        total_visits: u64,
        online_count: usize,
    },

    /// A visitor identified (new session or reconnect); operator group.
    VisitorConnected { session: SessionSummary },

    /// A visitor's live connection dropped; the session is retained.
    VisitorDisconnected { identity: VisitorIdentity },

    /// A session was archived and purged; operator group.
    SessionClosed { identity: VisitorIdentity },

    /// Sent to the affected visitor connection when its session is closed.
    SessionReset,

    /// Snapshot of every live-or-dormant session, sent once to a newly
    /// joined operator connection.
    InitialSessionList { sessions: Vec<SessionSummary> },

    /// Explicit error surfaced to the offending sender (e.g. oversized file).
    Error { code: String, message: String },

    /// Keep-alive reply.
    Pong,
}

/// Delivery target for an outbound event.
///
/// Replaces string-keyed room names: a typo in a channel is a compile error,
/// not a silently empty broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// The single live connection of one visitor identity, if any.
    Visitor(VisitorIdentity),
    /// Every identified operator connection.
    Operators,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{LinePayload, SpeakerRole};

    #[test]
    fn test_client_role_roundtrip() {
        for role in [ClientRole::Visitor, ClientRole::Operator] {
            let s = role.to_string();
            let parsed: ClientRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_identify_serde_roundtrip() {
        let cmd = ClientCommand::Identify {
            role: ClientRole::Visitor,
            name: Some("Ana".to_string()),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"identify\""));
        assert!(json.contains("\"role\":\"visitor\""));
        let parsed: ClientCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            ClientCommand::Identify {
                role: ClientRole::Visitor,
                ..
            }
        ));
    }

    #[test]
    fn test_visitor_message_without_email_parses() {
        let parsed: ClientCommand =
            serde_json::from_str(r#"{"type":"visitor_message","text":"hola"}"#).unwrap();
        assert!(matches!(
            parsed,
            ClientCommand::VisitorMessage { email: None, .. }
        ));
    }

    #[test]
    fn test_operator_file_serde_roundtrip() {
        let cmd = ClientCommand::OperatorFile {
            identity: VisitorIdentity::derive("Ana"),
            file_name: "invoice.pdf".to_string(),
            file_base64: "aGVsbG8=".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"operator_file\""));
        let parsed: ClientCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientCommand::OperatorFile { .. }));
    }

    #[test]
    fn test_malformed_command_is_err() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"shutdown"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>("not json").is_err());
    }

    #[test]
    fn test_message_delivered_serde_roundtrip() {
        let event = RelayEvent::MessageDelivered {
            identity: VisitorIdentity::derive("Ana"),
            display_name: "Ana".to_string(),
            text: "hola".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"message_delivered\""));
        assert!(json.contains("\"identity\":\"ana\""));
        let parsed: RelayEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, RelayEvent::MessageDelivered { .. }));
    }

    #[test]
    fn test_history_replay_preserves_order() {
        let lines = vec![
            TranscriptLine::new(SpeakerRole::Visitor, LinePayload::Text("a".to_string())),
            TranscriptLine::new(SpeakerRole::Operator, LinePayload::Text("b".to_string())),
        ];
        let event = RelayEvent::HistoryReplay {
            lines: lines.clone(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: RelayEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            RelayEvent::HistoryReplay { lines: replayed } => assert_eq!(replayed, lines),
            other => panic!("expected HistoryReplay, got {other:?}"),
        }
    }

    #[test]
    fn test_presence_update_serde_shape() {
        let event = RelayEvent::PresenceUpdate {
            total_visits: 42,
            online_count: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"presence_update\""));
        assert!(json.contains("\"total_visits\":42"));
        assert!(json.contains("\"online_count\":3"));
    }

    #[test]
    fn test_session_reset_serde_shape() {
        let json = serde_json::to_string(&RelayEvent::SessionReset).unwrap();
        assert_eq!(json, r#"{"type":"session_reset"}"#);
    }

    #[test]
    fn test_error_event_serde_shape() {
        let event = RelayEvent::Error {
            code: "file_too_large".to_string(),
            message: "629145600 bytes exceeds the 536870912 byte limit".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"code\":\"file_too_large\""));
    }
}
