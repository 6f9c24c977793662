//! Outbound handle for one transport connection.

use std::fmt;

use relaydesk_types::event::RelayEvent;
use relaydesk_types::identity::ConnectionId;
use tokio::sync::mpsc;

/// Sending side of a connection's outbound event queue.
///
/// The socket task owns the receiving end and pumps events onto the wire.
/// Delivery is best-effort: a full or closed queue drops the event rather
/// than blocking the relay, and a dropped event is simply lost.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<RelayEvent>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<RelayEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for this connection. Returns `false` when the event
    /// was dropped.
    pub fn send(&self, event: RelayEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection = %self.id, "Outbound queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection = %self.id, "Outbound queue closed, dropping event");
                false
            }
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").field("id", &self.id).finish()
    }
}
