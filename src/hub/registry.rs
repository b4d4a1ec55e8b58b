//! Session registry
//!
//! Holds the event-channel sender for every live viewer session. Mutated on
//! connect/disconnect, read during broadcast; a session whose receiver is
//! gone is pruned on the next delivery attempt.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Opaque transport identity of one viewer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Concurrency-safe registry of connected sessions
pub struct SessionRegistry {
    sessions: DashMap<SessionId, UnboundedSender<ServerEvent>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn register(&self, id: SessionId, tx: UnboundedSender<ServerEvent>) {
        self.sessions.insert(id, tx);
        tracing::debug!("session {} registered ({} total)", id, self.sessions.len());
    }

    /// Idempotent: deregistering an unknown session is a no-op.
    pub fn unregister(&self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            tracing::debug!("session {} removed ({} left)", id, self.sessions.len());
        }
    }

    /// Deliver an event to one session, if it is still connected.
    pub fn send_to(&self, id: SessionId, event: ServerEvent) {
        if let Some(tx) = self.sessions.get(&id) {
            let _ = tx.send(event);
        }
    }

    /// Deliver an event to every session connected at this instant, pruning
    /// sessions whose receiver has gone away.
    pub fn broadcast(&self, event: ServerEvent) {
        self.sessions.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
