//! The relay controller.
//!
//! All live state lives behind one mutex and every mutation runs to
//! completion inside it, so event handling is serialized: per-session
//! history order is exactly server arrival order, and presence counts
//! never tear. Durable writes are awaited inside the critical section,
//! which means anything the relay has acknowledged survives a restart.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use relaydesk_types::error::RelayError;
use relaydesk_types::event::{Channel, ClientRole, RelayEvent, SessionSummary};
use relaydesk_types::identity::{ConnectionId, VisitorIdentity};
use relaydesk_types::session::{PresenceState, SessionArchive, VisitorSession};
use relaydesk_types::transcript::{LinePayload, SpeakerRole, TranscriptLine};

use crate::archive::ArchiveSink;
use crate::relay::connection::ConnectionHandle;
use crate::relay::hub::OperatorHub;
use crate::store::SessionStore;

/// Mutable relay state. Owned exclusively by [`RelayService`]; every
/// access goes through its mutex.
#[derive(Default)]
struct RelayState {
    /// System of record for live semantics, mirrored to the store.
    sessions: HashMap<VisitorIdentity, VisitorSession>,
    /// At most one live connection per identity. A reconnect replaces
    /// the entry; the replaced connection's disconnect becomes stale.
    live: HashMap<VisitorIdentity, ConnectionHandle>,
    /// Reverse index from visitor connection to identity.
    visitor_conns: HashMap<ConnectionId, VisitorIdentity>,
    operators: OperatorHub,
    /// Cached mirror of the persisted lifetime visit counter.
    total_visits: u64,
}

impl RelayState {
    fn online_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == PresenceState::Connected)
            .count()
    }

    fn summary(&self, session: &VisitorSession) -> SessionSummary {
        SessionSummary {
            identity: session.identity.clone(),
            display_name: session.display_name.clone(),
            contact_email: session.contact_email.clone(),
            history: session.history.clone(),
            connected: session.state == PresenceState::Connected,
        }
    }

    fn summaries(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> =
            self.sessions.values().map(|s| self.summary(s)).collect();
        sessions.sort_by(|a, b| a.identity.as_str().cmp(b.identity.as_str()));
        sessions
    }

    /// Single egress point: every outbound event resolves a [`Channel`]
    /// here. Events to visitors without a live connection are dropped;
    /// the transcript is what they catch up from.
    fn deliver(&self, channel: &Channel, event: RelayEvent) {
        match channel {
            Channel::Visitor(identity) => {
                if let Some(handle) = self.live.get(identity) {
                    handle.send(event);
                }
            }
            Channel::Operators => {
                self.operators.broadcast(&event);
            }
        }
    }

    fn broadcast_presence(&self) {
        self.deliver(
            &Channel::Operators,
            RelayEvent::PresenceUpdate {
                total_visits: self.total_visits,
                online_count: self.online_count(),
            },
        );
    }
}

/// Coordinates sessions, connections, routing, presence, and archival.
///
/// Generic over its storage ports so tests run against the in-memory
/// implementations while the server runs on SQLite and the filesystem.
pub struct RelayService<S: SessionStore, A: ArchiveSink> {
    store: S,
    archive: A,
    max_file_bytes: u64,
    state: Mutex<RelayState>,
}

impl<S: SessionStore, A: ArchiveSink> RelayService<S, A> {
    pub fn new(store: S, archive: A, max_file_bytes: u64) -> Self {
        Self {
            store,
            archive,
            max_file_bytes,
            state: Mutex::new(RelayState::default()),
        }
    }

    /// Hydrate in-memory state from the store.
    ///
    /// Sessions persisted as connected belong to a process that died with
    /// sockets open; they come back as disconnected and the correction is
    /// written through. A store that cannot be read at all logs a warning
    /// and the relay starts empty rather than refusing to serve.
    pub async fn load(&self) {
        let mut state = self.state.lock().await;
        let sessions = match self.store.load_all().await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %err, "Failed to load sessions, starting empty");
                Vec::new()
            }
        };
        state.total_visits = match self.store.total_visits().await {
            Ok(total) => total,
            Err(err) => {
                warn!(error = %err, "Failed to load visit counter, starting at zero");
                0
            }
        };
        for mut session in sessions {
            if session.state == PresenceState::Connected {
                session.state = PresenceState::Disconnected;
                if let Err(err) = self.store.upsert_session(&session).await {
                    warn!(identity = %session.identity, error = %err, "Failed to write back presence");
                }
            }
            state.sessions.insert(session.identity.clone(), session);
        }
        info!(
            sessions = state.sessions.len(),
            total_visits = state.total_visits,
            "Relay state loaded"
        );
    }

    /// Register a freshly opened transport connection. It carries no role
    /// yet; routing starts once it identifies.
    pub async fn connect(&self, handle: &ConnectionHandle) {
        let state = self.state.lock().await;
        debug!(connection = %handle.id(), "Connection opened");
        state.broadcast_presence();
    }

    /// Bind a connection to a role. Visitors resolve to a session (new or
    /// resumed), operators join the fan-out hub.
    pub async fn identify(
        &self,
        handle: ConnectionHandle,
        role: ClientRole,
        name: Option<String>,
    ) -> Result<(), RelayError> {
        match role {
            ClientRole::Visitor => self.identify_visitor(handle, name).await,
            ClientRole::Operator => self.identify_operator(handle).await,
        }
    }

    async fn identify_visitor(
        &self,
        handle: ConnectionHandle,
        name: Option<String>,
    ) -> Result<(), RelayError> {
        let display_name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Guest".to_string());
        let identity = VisitorIdentity::derive(&display_name);
        let conn_id = handle.id();

        let mut state = self.state.lock().await;

        // A connection re-identifying under a new name releases its old
        // session first, or that session would stay Connected with no
        // transport behind it. Same guard as disconnect: only if this
        // connection is still the old identity's live pointer.
        let rebound = state
            .visitor_conns
            .get(&conn_id)
            .filter(|prev| **prev != identity)
            .cloned();
        if let Some(prev) = rebound {
            let still_live = state
                .live
                .get(&prev)
                .is_some_and(|live| live.id() == conn_id);
            if still_live {
                state.live.remove(&prev);
                let snapshot = match state.sessions.get_mut(&prev) {
                    Some(session) => {
                        if let Err(err) = session.transition(PresenceState::Disconnected) {
                            warn!(identity = %prev, error = err, "Presence transition on rebind");
                        }
                        session.last_active = Utc::now();
                        Some(session.clone())
                    }
                    None => None,
                };
                if let Some(snapshot) = snapshot {
                    self.store.upsert_session(&snapshot).await?;
                }
                info!(identity = %prev, connection = %conn_id, "Connection rebound to a new identity");
                state.deliver(
                    &Channel::Operators,
                    RelayEvent::VisitorDisconnected { identity: prev },
                );
            }
        }

        let session = state
            .sessions
            .entry(identity.clone())
            .or_insert_with(|| VisitorSession::new(identity.clone(), display_name.clone()));
        session.display_name = display_name;
        if session.state != PresenceState::Connected {
            if let Err(err) = session.transition(PresenceState::Connected) {
                warn!(identity = %identity, error = err, "Presence transition on identify");
            }
        }
        session.last_active = Utc::now();
        let replay = (!session.history.is_empty()).then(|| session.history.clone());
        let snapshot = session.clone();

        // Last identify wins. The replaced connection, if any, will report
        // a stale disconnect later and be ignored.
        state.live.insert(identity.clone(), handle.clone());
        state.visitor_conns.insert(conn_id, identity.clone());

        self.store.upsert_session(&snapshot).await?;
        state.total_visits = self.store.record_visit().await?;

        if let Some(lines) = replay {
            debug!(identity = %identity, lines = lines.len(), "Replaying history");
            handle.send(RelayEvent::HistoryReplay { lines });
        }
        let summary = state.summary(&snapshot);
        state.deliver(&Channel::Operators, RelayEvent::VisitorConnected { session: summary });
        state.broadcast_presence();
        info!(identity = %identity, connection = %conn_id, "Visitor identified");
        Ok(())
    }

    async fn identify_operator(&self, handle: ConnectionHandle) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        // Late joiners get absolute state, not deltas.
        handle.send(RelayEvent::InitialSessionList { sessions: state.summaries() });
        handle.send(RelayEvent::PresenceUpdate {
            total_visits: state.total_visits,
            online_count: state.online_count(),
        });
        info!(connection = %handle.id(), "Operator joined");
        state.operators.join(handle);
        Ok(())
    }

    /// Record a visitor line and fan it out to every operator console.
    /// An email given along the way sticks to the session.
    pub async fn visitor_message(
        &self,
        conn_id: ConnectionId,
        text: String,
        email: Option<String>,
    ) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        let Some(identity) = state.visitor_conns.get(&conn_id).cloned() else {
            return Err(RelayError::Unidentified(conn_id));
        };
        let Some(session) = state.sessions.get_mut(&identity) else {
            return Err(RelayError::UnknownIdentity(identity));
        };
        if let Some(email) = email {
            session.contact_email = Some(email);
        }
        let line = TranscriptLine::new(SpeakerRole::Visitor, LinePayload::Text(text.clone()));
        session.last_active = line.spoken_at;
        let seq = session.history.len() as u64;
        session.history.push(line.clone());
        let display_name = session.display_name.clone();
        let snapshot = session.clone();

        self.store.upsert_session(&snapshot).await?;
        self.store.append_line(&identity, seq, &line).await?;

        state.deliver(
            &Channel::Operators,
            RelayEvent::MessageDelivered {
                identity: identity.clone(),
                display_name,
                text,
                timestamp: line.spoken_at,
            },
        );
        Ok(())
    }

    /// Record an operator line and deliver it to the visitor's live
    /// connection, if there is one right now.
    pub async fn operator_reply(
        &self,
        identity: &VisitorIdentity,
        text: String,
    ) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(identity) else {
            return Err(RelayError::UnknownIdentity(identity.clone()));
        };
        let line = TranscriptLine::new(SpeakerRole::Operator, LinePayload::Text(text.clone()));
        session.last_active = line.spoken_at;
        let seq = session.history.len() as u64;
        session.history.push(line.clone());
        let snapshot = session.clone();

        self.store.upsert_session(&snapshot).await?;
        self.store.append_line(identity, seq, &line).await?;

        // An offline visitor picks the reply up from replay on reconnect.
        state.deliver(&Channel::Visitor(identity.clone()), RelayEvent::ReplyDelivered { text });
        Ok(())
    }

    /// Relay an operator file push. The payload is size-checked and
    /// decoded for validation only; the transcript records just the file
    /// name, and the original base64 is forwarded untouched.
    pub async fn operator_file(
        &self,
        sender: &ConnectionHandle,
        identity: &VisitorIdentity,
        file_name: String,
        file_base64: String,
    ) -> Result<(), RelayError> {
        // The estimate rounds up, so anything that passes also decodes
        // within the bound. Rejection happens before any decode work.
        let estimated = base64::decoded_len_estimate(file_base64.len()) as u64;
        if estimated > self.max_file_bytes {
            sender.send(RelayEvent::Error {
                code: "file_too_large".to_string(),
                message: format!(
                    "decoded file would be about {estimated} bytes, limit is {}",
                    self.max_file_bytes
                ),
            });
            return Err(RelayError::PayloadTooLarge {
                size: estimated,
                limit: self.max_file_bytes,
            });
        }
        if let Err(err) = BASE64.decode(file_base64.as_bytes()) {
            sender.send(RelayEvent::Error {
                code: "invalid_payload".to_string(),
                message: format!("file payload is not valid base64: {err}"),
            });
            return Err(RelayError::InvalidPayload(err.to_string()));
        }

        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(identity) else {
            return Err(RelayError::UnknownIdentity(identity.clone()));
        };
        let line = TranscriptLine::new(SpeakerRole::Operator, LinePayload::FileRef(file_name.clone()));
        session.last_active = line.spoken_at;
        let seq = session.history.len() as u64;
        session.history.push(line.clone());
        let snapshot = session.clone();

        self.store.upsert_session(&snapshot).await?;
        self.store.append_line(identity, seq, &line).await?;

        state.deliver(
            &Channel::Visitor(identity.clone()),
            RelayEvent::FileDelivered { file_name, file_base64 },
        );
        Ok(())
    }

    /// Close a session: write the transcript artifact, notify both sides,
    /// purge the session everywhere.
    ///
    /// The artifact write is the point of no return. If it fails the close
    /// aborts and the session stays live; the operator can retry. Past
    /// that point there is no rollback, only warnings.
    pub async fn close_session(&self, identity: &VisitorIdentity) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get(identity) else {
            return Err(RelayError::UnknownIdentity(identity.clone()));
        };
        let archive = SessionArchive::from_session(session, Utc::now());
        let path = self.archive.write(&archive).await?;
        info!(
            identity = %identity,
            path = %path.display(),
            lines = archive.history.len(),
            "Session archived"
        );

        state.deliver(&Channel::Visitor(identity.clone()), RelayEvent::SessionReset);
        state.deliver(
            &Channel::Operators,
            RelayEvent::SessionClosed { identity: identity.clone() },
        );

        if let Some(mut session) = state.sessions.remove(identity) {
            if let Err(err) = session.transition(PresenceState::Closed) {
                warn!(identity = %identity, error = err, "Presence transition on close");
            }
        }
        state.live.remove(identity);
        state.visitor_conns.retain(|_, bound| bound != identity);
        if let Err(err) = self.store.remove(identity).await {
            // The artifact exists; a leftover row resurfaces on restart
            // and can simply be closed again.
            warn!(identity = %identity, error = %err, "Failed to purge closed session");
        }
        state.broadcast_presence();
        Ok(())
    }

    /// Handle a transport close. Operators leave the hub; a visitor
    /// connection flips its session to disconnected only if it is still
    /// the live one, so a disconnect arriving after a reconnect is inert.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let mut state = self.state.lock().await;
        if state.operators.leave(&conn_id) {
            debug!(connection = %conn_id, "Operator left");
            state.broadcast_presence();
            return;
        }
        let Some(identity) = state.visitor_conns.remove(&conn_id) else {
            debug!(connection = %conn_id, "Unidentified connection closed");
            state.broadcast_presence();
            return;
        };
        let still_live = state
            .live
            .get(&identity)
            .is_some_and(|handle| handle.id() == conn_id);
        if !still_live {
            debug!(identity = %identity, connection = %conn_id, "Stale disconnect ignored");
            state.broadcast_presence();
            return;
        }
        state.live.remove(&identity);
        let snapshot = match state.sessions.get_mut(&identity) {
            Some(session) => {
                if let Err(err) = session.transition(PresenceState::Disconnected) {
                    warn!(identity = %identity, error = err, "Presence transition on disconnect");
                }
                session.last_active = Utc::now();
                Some(session.clone())
            }
            None => None,
        };
        if let Some(snapshot) = snapshot {
            if let Err(err) = self.store.upsert_session(&snapshot).await {
                warn!(identity = %identity, error = %err, "Failed to persist disconnect");
            }
        }
        info!(identity = %identity, connection = %conn_id, "Visitor disconnected");
        state.deliver(
            &Channel::Operators,
            RelayEvent::VisitorDisconnected { identity: identity.clone() },
        );
        state.broadcast_presence();
    }

    /// Current presence counters: lifetime visits and connected sessions.
    pub async fn presence(&self) -> (u64, usize) {
        let state = self.state.lock().await;
        (state.total_visits, state.online_count())
    }

    /// Operator-facing snapshot of every open session, ordered by
    /// identity.
    pub async fn session_summaries(&self) -> Vec<SessionSummary> {
        self.state.lock().await.summaries()
    }

    /// Number of attached operator consoles.
    pub async fn operator_count(&self) -> usize {
        self.state.lock().await.operators.len()
    }
}
