//! Event dispatch for the session server.
//!
//! [`Engine`] owns the connection registry, matchmaking queue and session
//! store, and is driven from a single task: every inbound event is handled to
//! completion before the next one starts, so no session is ever mutated
//! concurrently. Rejections go back to the requesting connection only.

use crate::broadcast::Broadcaster;
use crate::config::{ClockAuthority, ServerConfig};
use crate::error::EngineError;
use crate::matchmaking::{assign_colors, MatchOutcome, MatchmakingQueue};
use crate::oracle::{ChessRules, MoveOracle};
use crate::reaper;
use crate::reconnect::{JoinOutcome, LeaveOutcome};
use crate::registry::{ConnectionRegistry, EventSender, PlayerIdentity};
use crate::store::SessionStore;
use crate::utils::generate_session_id;
use crate::validation::validate_event;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ClientEvent, ConnectionId, MoveInput, Role, ServerEvent, SessionId, TimeControlRequest,
    UserId, DEFAULT_RATING,
};
use std::net::SocketAddr;

pub struct Engine {
    registry: ConnectionRegistry,
    queue: MatchmakingQueue,
    store: SessionStore,
    oracle: Box<dyn MoveOracle>,
    rng: StdRng,
    clock_authority: ClockAuthority,
    retention_ms: u64,
    max_chat_length: usize,
}

impl Engine {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_parts(config, Box::new(ChessRules), StdRng::from_entropy())
    }

    pub fn with_parts(config: &ServerConfig, oracle: Box<dyn MoveOracle>, rng: StdRng) -> Self {
        Self {
            registry: ConnectionRegistry::new(config.max_connections),
            queue: MatchmakingQueue::new(),
            store: SessionStore::new(),
            oracle,
            rng,
            clock_authority: config.clock_authority,
            retention_ms: config.retention_ms(),
            max_chat_length: config.max_chat_length,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Registers a new socket. Returns None when the server is full.
    pub fn connection_opened(
        &mut self,
        addr: SocketAddr,
        sender: EventSender,
    ) -> Option<ConnectionId> {
        self.registry.add_connection(addr, sender)
    }

    /// Cleans up after a socket is gone: leaves the queue, marks seats as
    /// disconnected, drops spectator entries. Games are not forfeited.
    pub fn connection_closed(&mut self, connection_id: ConnectionId) {
        self.queue.dequeue(connection_id);

        for id in self.store.sessions_for_connection(connection_id) {
            let Some(session) = self.store.get_mut(&id) else {
                continue;
            };

            if let LeaveOutcome::PlayerDisconnected(color) = session.leave(connection_id) {
                let username = session.slot(color).username.clone();
                info!("{} ({}) disconnected from game {}", username, color, id);

                let event = ServerEvent::PlayerDisconnected {
                    game_id: id.clone(),
                    role: color,
                    username,
                };
                Broadcaster::new(&self.registry).broadcast(session, &event, Some(connection_id));
            }
        }

        self.registry.forget(connection_id);
    }

    /// Handles one inbound event; any rejection is reported to the sender only.
    pub fn handle_event(&mut self, connection_id: ConnectionId, event: ClientEvent, now_ms: u64) {
        let name = event.name();
        let outcome = validate_event(&event, self.max_chat_length)
            .and_then(|()| self.dispatch(connection_id, event, now_ms));

        if let Err(e) = outcome {
            debug!("{} rejected for {}: {}", name, connection_id, e);
            self.registry.send(connection_id, e.to_event());
        }
    }

    fn dispatch(
        &mut self,
        connection_id: ConnectionId,
        event: ClientEvent,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        match event {
            ClientEvent::Authenticate {
                user_id,
                username,
                rating,
            } => self.authenticate(connection_id, user_id, username, rating),
            ClientEvent::JoinMatchmaking { time_control } => {
                self.join_matchmaking(connection_id, &time_control, now_ms)
            }
            ClientEvent::LeaveMatchmaking => self.leave_matchmaking(connection_id),
            ClientEvent::JoinGame { game_id } | ClientEvent::ReconnectToGame { game_id } => {
                self.join_game(connection_id, &game_id)
            }
            ClientEvent::MakeMove {
                game_id,
                mv,
                time_left,
            } => self.make_move(connection_id, &game_id, &mv, time_left, now_ms),
            ClientEvent::Resign { game_id } => self.resign(connection_id, &game_id, now_ms),
            ClientEvent::ChatMessage { game_id, message } => {
                self.chat(connection_id, &game_id, message.trim(), now_ms)
            }
        }
    }

    fn require_identity(&self, connection_id: ConnectionId) -> Result<PlayerIdentity, EngineError> {
        self.registry
            .lookup(connection_id)
            .cloned()
            .ok_or(EngineError::NotAuthenticated)
    }

    fn authenticate(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        username: String,
        rating: Option<u32>,
    ) -> Result<(), EngineError> {
        // A queued entry belongs to the identity it was made under
        self.queue.dequeue(connection_id);

        let identity = self
            .registry
            .authenticate(
                connection_id,
                user_id,
                username.trim().to_string(),
                rating.unwrap_or(DEFAULT_RATING),
            )
            .ok_or(EngineError::NotAuthenticated)?;

        let active_game_id = self.store.active_session_for_user(&identity.user_id).cloned();
        self.registry.send(
            connection_id,
            ServerEvent::Authenticated {
                success: true,
                player_info: identity.info(),
                active_game_id,
            },
        );
        Ok(())
    }

    fn join_matchmaking(
        &mut self,
        connection_id: ConnectionId,
        request: &TimeControlRequest,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        let identity = self.require_identity(connection_id)?;
        let time_control = request.validate().map_err(EngineError::InvalidRequest)?;

        match self.queue.enqueue(identity.clone(), time_control, now_ms) {
            MatchOutcome::Queued {
                position,
                queue_size,
            } => {
                debug!(
                    "{} queued for {}+{} at position {}",
                    identity.username,
                    time_control.initial_seconds(),
                    time_control.increment_seconds(),
                    position
                );
                self.registry.send(
                    connection_id,
                    ServerEvent::MatchmakingJoined {
                        queue_size,
                        position,
                    },
                );
            }
            MatchOutcome::Paired(waiting) => {
                let (white, black) = assign_colors(&mut self.rng, waiting.identity, identity);
                let mut id = generate_session_id(&mut self.rng, now_ms);
                while self.store.contains(&id) {
                    id = generate_session_id(&mut self.rng, now_ms);
                }
                let session = self.store.create_session(
                    id,
                    &white,
                    &black,
                    time_control,
                    self.oracle.initial_position(),
                    now_ms,
                );
                Broadcaster::new(&self.registry).broadcast_views(
                    session,
                    ServerEvent::GameStarted,
                    None,
                );
            }
        }
        Ok(())
    }

    fn leave_matchmaking(&mut self, connection_id: ConnectionId) -> Result<(), EngineError> {
        self.require_identity(connection_id)?;
        self.queue.dequeue(connection_id);
        self.registry.send(connection_id, ServerEvent::MatchmakingLeft);
        Ok(())
    }

    fn join_game(
        &mut self,
        connection_id: ConnectionId,
        game_id: &SessionId,
    ) -> Result<(), EngineError> {
        let identity = self.require_identity(connection_id)?;
        let session = self
            .store
            .get_mut(game_id)
            .ok_or(EngineError::SessionNotFound)?;

        let broadcaster = Broadcaster::new(&self.registry);
        match session.join(&identity) {
            JoinOutcome::Rejoined {
                color,
                previous_connection,
            } => {
                broadcaster.send_to(
                    connection_id,
                    ServerEvent::GameRejoined(session.view_for(color.into())),
                );
                if previous_connection != connection_id {
                    let event = ServerEvent::OpponentReconnected {
                        game_id: game_id.clone(),
                        role: color,
                        username: identity.username.clone(),
                    };
                    broadcaster.broadcast(session, &event, Some(connection_id));
                }
            }
            JoinOutcome::Spectating => {
                debug!("{} is watching game {}", identity.username, game_id);
                broadcaster.send_to(
                    connection_id,
                    ServerEvent::GameJoined(session.view_for(Role::Spectator)),
                );
            }
        }
        Ok(())
    }

    fn make_move(
        &mut self,
        connection_id: ConnectionId,
        game_id: &SessionId,
        mv: &MoveInput,
        time_left: Option<i64>,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        self.require_identity(connection_id)?;
        let session = self
            .store
            .get_mut(game_id)
            .ok_or(EngineError::SessionNotFound)?;

        let outcome = session.apply_move(
            connection_id,
            mv,
            time_left,
            self.oracle.as_ref(),
            self.clock_authority,
            now_ms,
        )?;

        let broadcaster = Broadcaster::new(&self.registry);
        broadcaster.broadcast(session, &outcome.to_event(), None);

        if let Some(result) = outcome.result {
            info!(
                "Game {} ended: {:?} by {:?} after {} plies",
                game_id,
                result.outcome,
                result.reason,
                session.move_log().len()
            );
            if let Some(ended) = session.ended_event() {
                broadcaster.broadcast(session, &ended, None);
            }
        }
        Ok(())
    }

    fn resign(
        &mut self,
        connection_id: ConnectionId,
        game_id: &SessionId,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        self.require_identity(connection_id)?;
        let session = self
            .store
            .get_mut(game_id)
            .ok_or(EngineError::SessionNotFound)?;

        let result = session.resign(connection_id, now_ms)?;
        info!("Game {} ended: {:?} by resignation", game_id, result.outcome);

        if let Some(ended) = session.ended_event() {
            Broadcaster::new(&self.registry).broadcast(session, &ended, None);
        }
        Ok(())
    }

    fn chat(
        &mut self,
        connection_id: ConnectionId,
        game_id: &SessionId,
        message: &str,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        let identity = self.require_identity(connection_id)?;
        let session = self
            .store
            .get(game_id)
            .ok_or(EngineError::SessionNotFound)?;

        if !session.is_observed_by(connection_id) {
            return Err(EngineError::NotAParticipant);
        }

        let event = ServerEvent::ChatMessage {
            game_id: game_id.clone(),
            username: identity.username,
            message: message.to_string(),
            timestamp: now_ms,
        };
        Broadcaster::new(&self.registry).broadcast(session, &event, None);
        Ok(())
    }

    /// Evicts finished games that have been idle past the retention window.
    pub fn reap(&mut self, now_ms: u64) -> Vec<SessionId> {
        reaper::sweep(&mut self.store, now_ms, self.retention_ms)
    }
}
