//! Authoritative state of a single game and the move/clock engine that mutates it.
//!
//! A [`Session`] is only ever changed through its methods: moves, resignation
//! and termination here, connection rebinding in `reconnect`. Every method
//! that can reject computes its full outcome before touching `self`, so a
//! rejected call leaves the session exactly as it found it.

use crate::config::ClockAuthority;
use crate::error::EngineError;
use crate::oracle::{repetition_key, MoveOracle};
use crate::registry::PlayerIdentity;
use log::debug;
use shared::{
    ClockSnapshot, Color, ConnectionId, EndReason, GameResult, MoveInput, MoveRecord, PlayerInfo,
    ResultView, Role, SeatView, ServerEvent, SessionId, SessionStatus, SessionView, TimeControl,
    UserId,
};
use std::collections::{BTreeSet, HashMap};

/// Threefold repetition ends the game in a draw.
const REPETITION_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Disconnected,
}

/// One side of the board, bound to a durable user and their current socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    pub user_id: UserId,
    pub username: String,
    pub rating: u32,
    pub connection_id: ConnectionId,
    pub presence: Presence,
}

impl PlayerSlot {
    pub fn from_identity(identity: &PlayerIdentity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            rating: identity.rating,
            connection_id: identity.connection_id,
            presence: Presence::Online,
        }
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            rating: self.rating,
        }
    }

    fn seat_view(&self) -> SeatView {
        SeatView {
            player: self.info(),
            online: self.presence == Presence::Online,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clocks {
    pub white_remaining_ms: i64,
    pub black_remaining_ms: i64,
    pub last_move_at: u64,
}

impl Clocks {
    pub fn remaining(&self, color: Color) -> i64 {
        match color {
            Color::White => self.white_remaining_ms,
            Color::Black => self.black_remaining_ms,
        }
    }

    fn set_remaining(&mut self, color: Color, remaining_ms: i64) {
        match color {
            Color::White => self.white_remaining_ms = remaining_ms,
            Color::Black => self.black_remaining_ms = remaining_ms,
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            white: self.white_remaining_ms,
            black: self.black_remaining_ms,
        }
    }
}

/// Everything observers need to know about an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub game_id: SessionId,
    pub position: String,
    pub turn: Color,
    pub clocks: ClockSnapshot,
    pub applied: MoveRecord,
    pub result: Option<GameResult>,
}

impl MoveResult {
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::MoveMade {
            game_id: self.game_id.clone(),
            fen: self.position.clone(),
            turn: self.turn,
            clocks: self.clocks,
            last_move: self.applied.clone(),
            game_result: self.result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    pub(crate) white: PlayerSlot,
    pub(crate) black: PlayerSlot,
    position: String,
    move_log: Vec<MoveRecord>,
    clocks: Clocks,
    time_control: TimeControl,
    status: SessionStatus,
    result: Option<GameResult>,
    pub(crate) spectators: BTreeSet<ConnectionId>,
    repetitions: HashMap<String, u32>,
    created_at: u64,
    ended_at: Option<u64>,
}

impl Session {
    pub fn new(
        id: SessionId,
        white: &PlayerIdentity,
        black: &PlayerIdentity,
        time_control: TimeControl,
        initial_position: String,
        now_ms: u64,
    ) -> Self {
        let mut repetitions = HashMap::new();
        repetitions.insert(repetition_key(&initial_position), 1);

        Self {
            id,
            white: PlayerSlot::from_identity(white),
            black: PlayerSlot::from_identity(black),
            position: initial_position,
            move_log: Vec::new(),
            clocks: Clocks {
                white_remaining_ms: time_control.initial_ms(),
                black_remaining_ms: time_control.initial_ms(),
                last_move_at: now_ms,
            },
            time_control,
            status: SessionStatus::Active,
            result: None,
            spectators: BTreeSet::new(),
            repetitions,
            created_at: now_ms,
            ended_at: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn move_log(&self) -> &[MoveRecord] {
        &self.move_log
    }

    pub fn clocks(&self) -> &Clocks {
        &self.clocks
    }

    pub fn time_control(&self) -> TimeControl {
        self.time_control
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Side to move, derived from the length of the move log.
    pub fn turn(&self) -> Color {
        Color::from_ply_count(self.move_log.len())
    }

    pub fn slot(&self, color: Color) -> &PlayerSlot {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub(crate) fn slot_mut(&mut self, color: Color) -> &mut PlayerSlot {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    pub fn spectators(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.spectators.iter().copied()
    }

    pub fn side_of_connection(&self, connection_id: ConnectionId) -> Option<Color> {
        if self.white.connection_id == connection_id {
            Some(Color::White)
        } else if self.black.connection_id == connection_id {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn side_of_user(&self, user_id: &UserId) -> Option<Color> {
        if &self.white.user_id == user_id {
            Some(Color::White)
        } else if &self.black.user_id == user_id {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn role_of(&self, connection_id: ConnectionId) -> Role {
        self.side_of_connection(connection_id)
            .map(Role::from)
            .unwrap_or(Role::Spectator)
    }

    /// True for either bound player or a registered spectator.
    pub fn is_observed_by(&self, connection_id: ConnectionId) -> bool {
        self.side_of_connection(connection_id).is_some()
            || self.spectators.contains(&connection_id)
    }

    /// Every connection that should hear about this session.
    pub fn recipients(&self) -> Vec<ConnectionId> {
        let mut recipients = vec![self.white.connection_id, self.black.connection_id];
        recipients.extend(self.spectators.iter().copied());
        recipients
    }

    /// Idle time is measured from the later of the last move and the end of play.
    pub fn last_activity_at(&self) -> u64 {
        self.ended_at
            .map_or(self.clocks.last_move_at, |ended| ended.max(self.clocks.last_move_at))
    }

    /// Validates and applies a move for the connection bound to the side on turn.
    pub fn apply_move(
        &mut self,
        connection_id: ConnectionId,
        mv: &MoveInput,
        reported_remaining_ms: Option<i64>,
        oracle: &dyn MoveOracle,
        authority: ClockAuthority,
        now_ms: u64,
    ) -> Result<MoveResult, EngineError> {
        if !self.is_active() {
            return Err(EngineError::SessionOver);
        }

        let mover = self
            .side_of_connection(connection_id)
            .ok_or(EngineError::NotAParticipant)?;
        if mover != self.turn() {
            return Err(EngineError::NotYourTurn);
        }

        let verdict = oracle.apply(&self.position, mv).map_err(|e| {
            debug!("Game {}: rejected {} ({})", self.id, mv, e);
            EngineError::IllegalMove(mv.to_string())
        })?;

        // Clock accounting
        let elapsed =
            i64::try_from(now_ms.saturating_sub(self.clocks.last_move_at)).unwrap_or(i64::MAX);
        let server_remaining = self.clocks.remaining(mover).saturating_sub(elapsed);
        let mover_remaining = match (authority, reported_remaining_ms) {
            (ClockAuthority::Client, Some(reported)) => reported,
            _ => server_remaining,
        };
        let flagged = mover_remaining <= 0;

        let mut clocks = self.clocks;
        clocks.set_remaining(
            mover,
            if flagged {
                mover_remaining
            } else {
                mover_remaining.saturating_add(self.time_control.increment_ms())
            },
        );
        clocks.last_move_at = now_ms;

        let applied = MoveRecord {
            ply: self.move_log.len() as u32 + 1,
            color: mover,
            san: verdict.san,
            uci: verdict.uci,
            fen: verdict.position.clone(),
        };

        let key = repetition_key(&verdict.position);
        let seen = self.repetitions.get(&key).copied().unwrap_or(0) + 1;

        let result = if flagged {
            Some(GameResult::win(mover.opponent(), EndReason::Timeout))
        } else if clocks.remaining(mover.opponent()) <= 0 {
            Some(GameResult::win(mover, EndReason::Timeout))
        } else if verdict.is_checkmate {
            Some(GameResult::win(mover, EndReason::Checkmate))
        } else if verdict.is_draw || seen >= REPETITION_LIMIT {
            Some(GameResult::draw())
        } else {
            None
        };

        // Commit
        self.repetitions.insert(key, seen);
        self.position = verdict.position;
        self.move_log.push(applied.clone());
        self.clocks = clocks;
        if let Some(result) = result {
            self.finish(result, now_ms);
        }

        Ok(MoveResult {
            game_id: self.id.clone(),
            position: self.position.clone(),
            turn: self.turn(),
            clocks: self.clocks.snapshot(),
            applied,
            result,
        })
    }

    /// Ends the game in favour of the resigning connection's opponent.
    pub fn resign(
        &mut self,
        connection_id: ConnectionId,
        now_ms: u64,
    ) -> Result<GameResult, EngineError> {
        if !self.is_active() {
            return Err(EngineError::SessionOver);
        }
        let side = self
            .side_of_connection(connection_id)
            .ok_or(EngineError::NotAParticipant)?;

        let result = GameResult::win(side.opponent(), EndReason::Resignation);
        self.finish(result, now_ms);
        Ok(result)
    }

    fn finish(&mut self, result: GameResult, now_ms: u64) {
        debug_assert!(self.is_active(), "a finished game cannot end twice");
        self.status = SessionStatus::Ended;
        self.result = Some(result);
        self.ended_at = Some(now_ms);
    }

    pub fn result_view(&self) -> Option<ResultView> {
        let result = self.result?;
        Some(ResultView {
            outcome: result.outcome,
            reason: result.reason,
            winner: result
                .winner()
                .map(|color| self.slot(color).username.clone()),
        })
    }

    pub fn ended_event(&self) -> Option<ServerEvent> {
        Some(ServerEvent::GameEnded {
            game_id: self.id.clone(),
            result: self.result_view()?,
        })
    }

    /// Full snapshot shaped for a recipient with the given role.
    pub fn view_for(&self, role: Role) -> SessionView {
        let is_your_turn = role
            .color()
            .map(|color| self.is_active() && color == self.turn());

        SessionView {
            game_id: self.id.clone(),
            white: self.white.seat_view(),
            black: self.black.seat_view(),
            fen: self.position.clone(),
            moves: self.move_log.clone(),
            turn: self.turn(),
            clocks: self.clocks.snapshot(),
            time_control: self.time_control,
            status: self.status,
            result: self.result,
            spectators: self.spectators.len(),
            role,
            is_your_turn,
        }
    }
}
