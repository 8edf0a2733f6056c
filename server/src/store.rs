//! In-memory table of every session this process owns.

use crate::registry::PlayerIdentity;
use crate::session::Session;
use log::{info, warn};
use shared::{ConnectionId, SessionId, TimeControl, UserId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Creates an active session with both clocks at the full initial time.
    ///
    /// Callers pick unused ids; an existing session under the same id is
    /// replaced so the returned session is always the new one.
    pub fn create_session(
        &mut self,
        id: SessionId,
        white: &PlayerIdentity,
        black: &PlayerIdentity,
        time_control: TimeControl,
        initial_position: String,
        now_ms: u64,
    ) -> &Session {
        info!(
            "Game {} created: {} (white) vs {} (black), {}+{}",
            id,
            white.username,
            black.username,
            time_control.initial_seconds(),
            time_control.increment_seconds()
        );
        let session = Session::new(
            id.clone(),
            white,
            black,
            time_control,
            initial_position,
            now_ms,
        );
        match self.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                warn!("Game {} already existed and was replaced", entry.key());
                entry.insert(session);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Sessions in which this connection plays or spectates.
    pub fn sessions_for_connection(&self, connection_id: ConnectionId) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|session| session.is_observed_by(connection_id))
            .map(|session| session.id().clone())
            .collect()
    }

    /// Most recently created active session this user is seated in.
    pub fn active_session_for_user(&self, user_id: &UserId) -> Option<&SessionId> {
        self.sessions
            .values()
            .filter(|session| session.is_active() && session.side_of_user(user_id).is_some())
            .max_by_key(|session| session.created_at())
            .map(Session::id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
