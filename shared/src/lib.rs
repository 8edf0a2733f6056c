//! Wire protocol shared by the session server and its clients.
//!
//! Every frame is a JSON object of the form
//! `{"event": "<snake_case name>", "data": { <camelCase fields> }}`.
//! Inbound frames decode into [`ClientEvent`], outbound ones into [`ServerEvent`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_RATING: u32 = 1200;
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub const MAX_INITIAL_SECONDS: u32 = 10_800;
pub const MAX_INCREMENT_SECONDS: u32 = 180;
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Transport-level handle for one live socket. Changes on every reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Durable player identity issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Side to move after `plies` half-moves from the initial position.
    pub fn from_ply_count(plies: usize) -> Self {
        if plies % 2 == 0 {
            Color::White
        } else {
            Color::Black
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// How a recipient relates to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
    Spectator,
}

impl From<Color> for Role {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Role::White,
            Color::Black => Role::Black,
        }
    }
}

impl Role {
    pub fn color(self) -> Option<Color> {
        match self {
            Role::White => Some(Color::White),
            Role::Black => Some(Color::Black),
            Role::Spectator => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeCategory {
    Bullet,
    Blitz,
    Rapid,
    Classical,
}

impl TimeCategory {
    pub fn from_initial_seconds(initial_seconds: u32) -> Self {
        match initial_seconds {
            0..=179 => TimeCategory::Bullet,
            180..=599 => TimeCategory::Blitz,
            600..=1799 => TimeCategory::Rapid,
            _ => TimeCategory::Classical,
        }
    }
}

/// Clock rule for a game. The category is always derived from the initial time,
/// so two controls are equal exactly when their initial time and increment are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeControl {
    #[serde(rename = "initial")]
    initial_seconds: u32,
    #[serde(rename = "increment")]
    increment_seconds: u32,
    #[serde(rename = "type")]
    category: TimeCategory,
}

impl TimeControl {
    pub fn new(initial_seconds: u32, increment_seconds: u32) -> Self {
        Self {
            initial_seconds,
            increment_seconds,
            category: TimeCategory::from_initial_seconds(initial_seconds),
        }
    }

    pub fn initial_seconds(&self) -> u32 {
        self.initial_seconds
    }

    pub fn increment_seconds(&self) -> u32 {
        self.increment_seconds
    }

    pub fn category(&self) -> TimeCategory {
        self.category
    }

    pub fn initial_ms(&self) -> i64 {
        i64::from(self.initial_seconds) * 1000
    }

    pub fn increment_ms(&self) -> i64 {
        i64::from(self.increment_seconds) * 1000
    }
}

/// Time control as a client sends it. The `type` label is advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControlRequest {
    pub initial: u32,
    #[serde(default)]
    pub increment: u32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl TimeControlRequest {
    pub fn validate(&self) -> Result<TimeControl, String> {
        if self.initial == 0 || self.initial > MAX_INITIAL_SECONDS {
            return Err(format!(
                "initial time must be between 1 and {} seconds",
                MAX_INITIAL_SECONDS
            ));
        }
        if self.increment > MAX_INCREMENT_SECONDS {
            return Err(format!(
                "increment must be at most {} seconds",
                MAX_INCREMENT_SECONDS
            ));
        }
        Ok(TimeControl::new(self.initial, self.increment))
    }
}

impl From<TimeControl> for TimeControlRequest {
    fn from(tc: TimeControl) -> Self {
        Self {
            initial: tc.initial_seconds,
            increment: tc.increment_seconds,
            kind: serde_json::to_value(tc.category)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    WhiteWin,
    BlackWin,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Checkmate,
    Resignation,
    Timeout,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub outcome: GameOutcome,
    pub reason: EndReason,
}

impl GameResult {
    pub fn win(winner: Color, reason: EndReason) -> Self {
        let outcome = match winner {
            Color::White => GameOutcome::WhiteWin,
            Color::Black => GameOutcome::BlackWin,
        };
        Self { outcome, reason }
    }

    pub fn draw() -> Self {
        Self {
            outcome: GameOutcome::Draw,
            reason: EndReason::Draw,
        }
    }

    pub fn winner(&self) -> Option<Color> {
        match self.outcome {
            GameOutcome::WhiteWin => Some(Color::White),
            GameOutcome::BlackWin => Some(Color::Black),
            GameOutcome::Draw => None,
        }
    }
}

/// A move as submitted: SAN (`"Nf3"`), coordinates (`"g1f3"`, `"e7e8q"`)
/// or an explicit `{from, to, promotion}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveInput {
    Text(String),
    Coordinates {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
    },
}

impl MoveInput {
    pub fn text(mv: impl Into<String>) -> Self {
        MoveInput::Text(mv.into())
    }
}

impl fmt::Display for MoveInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveInput::Text(text) => f.write_str(text),
            MoveInput::Coordinates {
                from,
                to,
                promotion,
            } => write!(f, "{}{}{}", from, to, promotion.as_deref().unwrap_or("")),
        }
    }
}

/// One applied ply in a session's move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub ply: u32,
    pub color: Color,
    pub san: String,
    pub uci: String,
    pub fen: String,
}

/// Remaining time per side, in milliseconds. May be negative after a flag fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white: i64,
    pub black: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub user_id: UserId,
    pub username: String,
    pub rating: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    #[serde(flatten)]
    pub player: PlayerInfo,
    pub online: bool,
}

/// Full session snapshot, rendered once per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub game_id: SessionId,
    pub white: SeatView,
    pub black: SeatView,
    pub fen: String,
    pub moves: Vec<MoveRecord>,
    pub turn: Color,
    pub clocks: ClockSnapshot,
    pub time_control: TimeControl,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
    pub spectators: usize,
    pub role: Role,
    /// Only present for player roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_your_turn: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultView {
    pub outcome: GameOutcome,
    pub reason: EndReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    Authenticate {
        user_id: UserId,
        username: String,
        #[serde(default)]
        rating: Option<u32>,
    },
    JoinMatchmaking {
        time_control: TimeControlRequest,
    },
    LeaveMatchmaking,
    JoinGame {
        game_id: SessionId,
    },
    ReconnectToGame {
        game_id: SessionId,
    },
    MakeMove {
        game_id: SessionId,
        #[serde(rename = "move")]
        mv: MoveInput,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_left: Option<i64>,
    },
    Resign {
        game_id: SessionId,
    },
    ChatMessage {
        game_id: SessionId,
        message: String,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate { .. } => "authenticate",
            ClientEvent::JoinMatchmaking { .. } => "join_matchmaking",
            ClientEvent::LeaveMatchmaking => "leave_matchmaking",
            ClientEvent::JoinGame { .. } => "join_game",
            ClientEvent::ReconnectToGame { .. } => "reconnect_to_game",
            ClientEvent::MakeMove { .. } => "make_move",
            ClientEvent::Resign { .. } => "resign",
            ClientEvent::ChatMessage { .. } => "chat_message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Authenticated {
        success: bool,
        player_info: PlayerInfo,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_game_id: Option<SessionId>,
    },
    MatchmakingJoined {
        queue_size: usize,
        position: usize,
    },
    MatchmakingLeft,
    GameStarted(SessionView),
    GameJoined(SessionView),
    GameRejoined(SessionView),
    MoveMade {
        game_id: SessionId,
        fen: String,
        turn: Color,
        clocks: ClockSnapshot,
        last_move: MoveRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_result: Option<GameResult>,
    },
    GameEnded {
        game_id: SessionId,
        result: ResultView,
    },
    OpponentReconnected {
        game_id: SessionId,
        role: Color,
        username: String,
    },
    PlayerDisconnected {
        game_id: SessionId,
        role: Color,
        username: String,
    },
    ChatMessage {
        game_id: SessionId,
        username: String,
        message: String,
        timestamp: u64,
    },
    Error {
        code: String,
        message: String,
    },
}

pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    serde_json::from_str(text)
}
