//! Fan-out group for identified operator connections.

use std::collections::HashMap;

use relaydesk_types::event::RelayEvent;
use relaydesk_types::identity::ConnectionId;

use super::connection::ConnectionHandle;

/// The set of operator consoles currently attached to the relay.
///
/// Lives inside the relay state mutex, so it needs no locking of its own.
/// Members that fall behind lose individual events (see
/// [`ConnectionHandle::send`]) but are never evicted; a console that is
/// truly gone leaves via its transport disconnect.
#[derive(Default)]
pub struct OperatorHub {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl OperatorHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, handle: ConnectionHandle) {
        self.connections.insert(handle.id(), handle);
    }

    /// Remove a member. Returns `false` if the connection was not an
    /// operator.
    pub fn leave(&mut self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Queue an event for every member. Returns how many accepted it.
    pub fn broadcast(&self, event: &RelayEvent) -> usize {
        let mut delivered = 0;
        for handle in self.connections.values() {
            if handle.send(event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
