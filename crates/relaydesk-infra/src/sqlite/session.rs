//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `relaydesk-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reader for SELECTs,
//! writer for mutations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use relaydesk_core::store::SessionStore;
use relaydesk_types::error::StoreError;
use relaydesk_types::identity::VisitorIdentity;
use relaydesk_types::session::{PresenceState, VisitorSession};
use relaydesk_types::transcript::{LinePayload, SpeakerRole, TranscriptLine};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    identity: String,
    display_name: String,
    contact_email: Option<String>,
    state: String,
    started_at: String,
    last_active: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            identity: row.try_get("identity")?,
            display_name: row.try_get("display_name")?,
            contact_email: row.try_get("contact_email")?,
            state: row.try_get("state")?,
            started_at: row.try_get("started_at")?,
            last_active: row.try_get("last_active")?,
        })
    }

    fn into_session(self, history: Vec<TranscriptLine>) -> Result<VisitorSession, StoreError> {
        let state: PresenceState = self
            .state
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;
        let started_at = parse_datetime(&self.started_at)?;
        let last_active = parse_datetime(&self.last_active)?;

        Ok(VisitorSession {
            identity: VisitorIdentity(self.identity),
            display_name: self.display_name,
            contact_email: self.contact_email,
            history,
            state,
            started_at,
            last_active,
        })
    }
}

struct LineRow {
    identity: String,
    spoken_at: String,
    speaker: String,
    kind: String,
    body: String,
}

impl LineRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            identity: row.try_get("identity")?,
            spoken_at: row.try_get("spoken_at")?,
            speaker: row.try_get("speaker")?,
            kind: row.try_get("kind")?,
            body: row.try_get("body")?,
        })
    }

    fn into_line(self) -> Result<TranscriptLine, StoreError> {
        let speaker: SpeakerRole = self
            .speaker
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;
        let payload =
            LinePayload::from_columns(&self.kind, self.body).map_err(StoreError::Query)?;
        let spoken_at = parse_datetime(&self.spoken_at)?;

        Ok(TranscriptLine {
            spoken_at,
            speaker,
            payload,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn load_all(&self) -> Result<Vec<VisitorSession>, StoreError> {
        let line_rows = sqlx::query("SELECT * FROM transcript_lines ORDER BY identity, seq ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        // Bucket transcripts by identity, preserving seq order within each.
        let mut transcripts: HashMap<String, Vec<TranscriptLine>> = HashMap::new();
        for row in &line_rows {
            let line_row =
                LineRow::from_row(row).map_err(|e| StoreError::Query(e.to_string()))?;
            let identity = line_row.identity.clone();
            match line_row.into_line() {
                Ok(line) => transcripts.entry(identity).or_default().push(line),
                Err(err) => {
                    tracing::warn!(identity = %identity, error = %err, "Skipping undecodable transcript line");
                }
            }
        }

        let session_rows = sqlx::query("SELECT * FROM sessions ORDER BY started_at ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut sessions = Vec::with_capacity(session_rows.len());
        for row in &session_rows {
            let session_row =
                SessionRow::from_row(row).map_err(|e| StoreError::Query(e.to_string()))?;
            let identity = session_row.identity.clone();
            let history = transcripts.remove(&identity).unwrap_or_default();
            match session_row.into_session(history) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    tracing::warn!(identity = %identity, error = %err, "Skipping undecodable session row");
                }
            }
        }

        Ok(sessions)
    }

    async fn upsert_session(&self, session: &VisitorSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO sessions (identity, display_name, contact_email, state, started_at, last_active)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(identity) DO UPDATE SET
                   display_name = excluded.display_name,
                   contact_email = excluded.contact_email,
                   state = excluded.state,
                   last_active = excluded.last_active"#,
        )
        .bind(session.identity.as_str())
        .bind(&session.display_name)
        .bind(&session.contact_email)
        .bind(session.state.to_string())
        .bind(format_datetime(&session.started_at))
        .bind(format_datetime(&session.last_active))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn append_line(
        &self,
        identity: &VisitorIdentity,
        seq: u64,
        line: &TranscriptLine,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO transcript_lines (identity, seq, spoken_at, speaker, kind, body)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(identity.as_str())
        .bind(seq as i64)
        .bind(format_datetime(&line.spoken_at))
        .bind(line.speaker.to_string())
        .bind(line.payload.kind_str())
        .bind(line.payload.body_str())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e.as_database_error().map(|db| db.kind()) {
            Some(sqlx::error::ErrorKind::UniqueViolation) => {
                StoreError::Conflict(format!("line seq {seq} for '{identity}' already exists"))
            }
            Some(sqlx::error::ErrorKind::ForeignKeyViolation) => StoreError::NotFound,
            _ => StoreError::Query(e.to_string()),
        })?;

        Ok(())
    }

    async fn remove(&self, identity: &VisitorIdentity) -> Result<(), StoreError> {
        // Transcript lines go with the session via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM sessions WHERE identity = ?")
            .bind(identity.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn record_visit(&self) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "UPDATE relay_counters SET value = value + 1 WHERE name = 'total_visits' RETURNING value",
        )
        .fetch_one(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let value: i64 = row
            .try_get("value")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(value as u64)
    }

    async fn total_visits(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT value FROM relay_counters WHERE name = 'total_visits'")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let value: i64 = row
            .try_get("value")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(value as u64)
    }
}
