//! Session persistence port and its in-memory reference implementation.

use std::collections::HashMap;

use relaydesk_types::error::StoreError;
use relaydesk_types::identity::VisitorIdentity;
use relaydesk_types::session::VisitorSession;
use relaydesk_types::transcript::TranscriptLine;

/// Durable storage for visitor sessions, their transcripts, and the
/// lifetime visit counter.
///
/// The relay treats its own in-memory maps as the system of record and
/// mirrors every mutation through this trait before acknowledging it, so
/// a store implementation never has to reconcile concurrent writers.
pub trait SessionStore: Send + Sync {
    /// Load every stored session with its transcript ordered by sequence.
    fn load_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<VisitorSession>, StoreError>> + Send;

    /// Insert or update session metadata (display name, email, presence
    /// state, timestamps). Transcript lines only move through
    /// [`SessionStore::append_line`]; an upsert never rewrites history.
    fn upsert_session(
        &self,
        session: &VisitorSession,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Append one transcript line at position `seq`.
    ///
    /// Sequences are dense and zero-based per session. A `seq` that is not
    /// the next free position is a [`StoreError::Conflict`].
    fn append_line(
        &self,
        identity: &VisitorIdentity,
        seq: u64,
        line: &TranscriptLine,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Purge a session and its transcript. Only the archival path calls
    /// this, after the transcript artifact has been written.
    fn remove(
        &self,
        identity: &VisitorIdentity,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Durably increment the lifetime visit counter and return the new
    /// total. Counts visits, not visitors: reconnects increment too.
    fn record_visit(&self) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// Current value of the lifetime visit counter.
    fn total_visits(&self) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<VisitorIdentity, VisitorSession>,
    visits: u64,
}

/// In-memory [`SessionStore`] for tests and ephemeral runs.
///
/// Mirrors the SQLite implementation's semantics: upserts leave history
/// untouched, line sequences are dense, and the visit counter only grows.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: tokio::sync::Mutex<MemoryInner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    async fn load_all(&self) -> Result<Vec<VisitorSession>, StoreError> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<VisitorSession> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(sessions)
    }

    async fn upsert_session(&self, session: &VisitorSession) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get_mut(&session.identity) {
            Some(existing) => {
                existing.display_name = session.display_name.clone();
                existing.contact_email = session.contact_email.clone();
                existing.state = session.state;
                existing.started_at = session.started_at;
                existing.last_active = session.last_active;
            }
            None => {
                let mut fresh = session.clone();
                fresh.history.clear();
                inner.sessions.insert(fresh.identity.clone(), fresh);
            }
        }
        Ok(())
    }

    async fn append_line(
        &self,
        identity: &VisitorIdentity,
        seq: u64,
        line: &TranscriptLine,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let session = inner.sessions.get_mut(identity).ok_or(StoreError::NotFound)?;
        let expected = session.history.len() as u64;
        if seq != expected {
            return Err(StoreError::Conflict(format!(
                "line seq {seq} for '{identity}', expected {expected}"
            )));
        }
        session.history.push(line.clone());
        Ok(())
    }

    async fn remove(&self, identity: &VisitorIdentity) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .sessions
            .remove(identity)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn record_visit(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.visits += 1;
        Ok(inner.visits)
    }

    async fn total_visits(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().await.visits)
    }
}
