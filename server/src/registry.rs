//! Connection registry for the session server
//!
//! This module tracks every live socket and, once it has authenticated, the
//! player identity behind it:
//! - Connection lifecycle (open, authenticate, forget)
//! - Outbound delivery handles used by the broadcaster
//! - Capacity enforcement
//!
//! The registry is keyed by [`ConnectionId`], which changes on every reconnect.
//! Durable session bindings are keyed by [`UserId`] elsewhere and survive a
//! connection being forgotten here.

use log::{debug, info};
use shared::{ConnectionId, PlayerInfo, ServerEvent, UserId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Outbound handle for a single connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Authenticated player behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: String,
    pub rating: u32,
}

impl PlayerIdentity {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            rating: self.rating,
        }
    }
}

/// A live socket and, once authenticated, who is on the other end.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: EventSender,
    identity: Option<PlayerIdentity>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: EventSender) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            identity: None,
        }
    }

    /// Queues an event for this connection. Returns false if the socket task
    /// has already gone away.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: u64,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a freshly opened socket.
    ///
    /// Returns None when the registry is at capacity.
    pub fn add_connection(&mut self, addr: SocketAddr, sender: EventSender) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        info!("Connection {} opened from {}", id, addr);
        self.connections.insert(id, Connection::new(id, addr, sender));
        Some(id)
    }

    /// Binds an identity to a connection, replacing any prior identity.
    ///
    /// Returns None if the connection is not registered.
    pub fn authenticate(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        username: String,
        rating: u32,
    ) -> Option<PlayerIdentity> {
        let connection = self.connections.get_mut(&connection_id)?;
        let identity = PlayerIdentity {
            connection_id,
            user_id,
            username,
            rating,
        };

        if let Some(previous) = connection.identity.replace(identity.clone()) {
            debug!(
                "Connection {} re-authenticated ({} -> {})",
                connection_id, previous.user_id, identity.user_id
            );
        }
        info!(
            "Connection {} authenticated as {} ({})",
            connection_id, identity.username, identity.user_id
        );
        Some(identity)
    }

    pub fn lookup(&self, connection_id: ConnectionId) -> Option<&PlayerIdentity> {
        self.connections
            .get(&connection_id)
            .and_then(|connection| connection.identity.as_ref())
    }

    /// Drops a connection and its identity. Returns the identity it held, if any.
    pub fn forget(&mut self, connection_id: ConnectionId) -> Option<PlayerIdentity> {
        let connection = self.connections.remove(&connection_id)?;
        info!(
            "Connection {} closed after {:?}",
            connection_id,
            connection.connected_at.elapsed()
        );
        connection.identity
    }

    pub fn is_live(&self, connection_id: ConnectionId) -> bool {
        self.connections
            .get(&connection_id)
            .map(Connection::is_open)
            .unwrap_or(false)
    }

    /// Best-effort delivery; unknown or closed connections are skipped.
    pub fn send(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&connection_id) {
            Some(connection) => connection.send(event),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn authenticated_count(&self) -> usize {
        self.connections
            .values()
            .filter(|connection| connection.identity.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn channel() -> (EventSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_add_connection_assigns_increasing_ids() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert_eq!(registry.add_connection(test_addr(), tx1), Some(ConnectionId(1)));
        assert_eq!(registry.add_connection(test_addr(), tx2), Some(ConnectionId(2)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_add_connection_max_capacity() {
        let mut registry = ConnectionRegistry::new(1);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(registry.add_connection(test_addr(), tx1).is_some());
        assert!(registry.add_connection(test_addr(), tx2).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_requires_authentication() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx, _rx) = channel();
        let id = registry.add_connection(test_addr(), tx).unwrap();

        assert!(registry.lookup(id).is_none());

        let identity = registry
            .authenticate(id, UserId::new("u1"), "alice".into(), 1500)
            .unwrap();
        assert_eq!(identity.connection_id, id);
        assert_eq!(registry.lookup(id), Some(&identity));
        assert_eq!(registry.authenticated_count(), 1);
    }

    #[test]
    fn test_authenticate_replaces_prior_identity() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx, _rx) = channel();
        let id = registry.add_connection(test_addr(), tx).unwrap();

        registry.authenticate(id, UserId::new("u1"), "alice".into(), 1500);
        registry.authenticate(id, UserId::new("u2"), "bob".into(), 1400);

        let identity = registry.lookup(id).unwrap();
        assert_eq!(identity.user_id, UserId::new("u2"));
        assert_eq!(identity.username, "bob");
    }

    #[test]
    fn test_authenticate_unknown_connection() {
        let mut registry = ConnectionRegistry::new(4);
        assert!(registry
            .authenticate(ConnectionId(99), UserId::new("u1"), "alice".into(), 1500)
            .is_none());
    }

    #[test]
    fn test_forget_returns_identity() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx, _rx) = channel();
        let id = registry.add_connection(test_addr(), tx).unwrap();
        registry.authenticate(id, UserId::new("u1"), "alice".into(), 1500);

        let identity = registry.forget(id).unwrap();
        assert_eq!(identity.user_id, UserId::new("u1"));
        assert!(registry.is_empty());
        assert!(registry.forget(id).is_none());
    }

    #[test]
    fn test_send_skips_closed_connections() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx, rx) = channel();
        let id = registry.add_connection(test_addr(), tx).unwrap();

        assert!(registry.is_live(id));
        assert!(registry.send(id, ServerEvent::MatchmakingLeft));

        drop(rx);
        assert!(!registry.is_live(id));
        assert!(!registry.send(id, ServerEvent::MatchmakingLeft));
        assert!(!registry.send(ConnectionId(42), ServerEvent::MatchmakingLeft));
    }
}
