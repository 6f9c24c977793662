//! Transcript line types for visitor/operator conversations.
//!
//! A session's history is an ordered, append-only list of `TranscriptLine`s.
//! Lines carry either message text or a file reference -- raw file bytes are
//! relayed live and never enter a transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Who spoke a transcript line.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (speaker IN ('visitor', 'operator'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Visitor,
    Operator,
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerRole::Visitor => write!(f, "visitor"),
            SpeakerRole::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for SpeakerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visitor" => Ok(SpeakerRole::Visitor),
            "operator" => Ok(SpeakerRole::Operator),
            other => Err(format!("invalid speaker role: '{other}'")),
        }
    }
}

/// Content of a transcript line: message text, or the name of a relayed file.
///
/// `FileRef` records that a file was pushed; the payload itself is delivered
/// only to the live connection and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum LinePayload {
    Text(String),
    FileRef(String),
}

impl LinePayload {
    /// The `kind` column value for the SQLite schema
    /// (`CHECK (kind IN ('text', 'file_ref'))`).
    pub fn kind_str(&self) -> &'static str {
        match self {
            LinePayload::Text(_) => "text",
            LinePayload::FileRef(_) => "file_ref",
        }
    }

    /// The `body` column value: message text or file name.
    pub fn body_str(&self) -> &str {
        match self {
            LinePayload::Text(body) => body,
            LinePayload::FileRef(body) => body,
        }
    }

    /// Rebuild a payload from its `kind`/`body` column pair.
    pub fn from_columns(kind: &str, body: String) -> Result<Self, String> {
        match kind {
            "text" => Ok(LinePayload::Text(body)),
            "file_ref" => Ok(LinePayload::FileRef(body)),
            other => Err(format!("invalid payload kind: '{other}'")),
        }
    }
}

/// A single line in a session transcript.
///
/// Lines are ordered by their position in the history (server arrival order),
/// not by `spoken_at`; the timestamp is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub spoken_at: DateTime<Utc>,
    pub speaker: SpeakerRole,
    pub payload: LinePayload,
}

impl TranscriptLine {
    /// Create a line spoken now.
    pub fn new(speaker: SpeakerRole, payload: LinePayload) -> Self {
        Self {
            spoken_at: Utc::now(),
            speaker,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_role_roundtrip() {
        for role in [SpeakerRole::Visitor, SpeakerRole::Operator] {
            let s = role.to_string();
            let parsed: SpeakerRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_speaker_role_rejects_unknown() {
        assert!("admin".parse::<SpeakerRole>().is_err());
    }

    #[test]
    fn test_payload_serde_shape() {
        let text = LinePayload::Text("hola".to_string());
        let json = serde_json::to_string(&text).unwrap();
        assert_eq!(json, r#"{"kind":"text","body":"hola"}"#);

        let file = LinePayload::FileRef("invoice.pdf".to_string());
        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(json, r#"{"kind":"file_ref","body":"invoice.pdf"}"#);
    }

    #[test]
    fn test_payload_columns_roundtrip() {
        for payload in [
            LinePayload::Text("hello".to_string()),
            LinePayload::FileRef("a.png".to_string()),
        ] {
            let rebuilt =
                LinePayload::from_columns(payload.kind_str(), payload.body_str().to_string())
                    .unwrap();
            assert_eq!(rebuilt, payload);
        }
    }

    #[test]
    fn test_payload_from_columns_rejects_unknown_kind() {
        assert!(LinePayload::from_columns("image", "x".to_string()).is_err());
    }

    #[test]
    fn test_transcript_line_serde_roundtrip() {
        let line = TranscriptLine::new(
            SpeakerRole::Visitor,
            LinePayload::Text("hola".to_string()),
        );
        let json = serde_json::to_string(&line).unwrap();
        let parsed: TranscriptLine = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, line);
    }
}
