use log::debug;
use shared::{
    ClockSnapshot, Color, GameResult, MoveRecord, ResultView, Role, ServerEvent, SessionId,
    SessionStatus, SessionView,
};

/// Local mirror of the one game this client is attached to.
///
/// The mirror never decides anything; it only replays what the server
/// broadcasts. Events for other games are ignored.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    view: Option<SessionView>,
    final_result: Option<ResultView>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server event into the mirror. Returns true if it changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::GameStarted(view)
            | ServerEvent::GameJoined(view)
            | ServerEvent::GameRejoined(view) => {
                debug!("Loaded game {} as {:?}", view.game_id, view.role);
                self.final_result = None;
                self.view = Some(view.clone());
                true
            }

            ServerEvent::MoveMade {
                game_id,
                fen,
                turn,
                clocks,
                last_move,
                game_result,
            } => {
                let Some(view) = self.view_for_mut(game_id) else {
                    return false;
                };
                // Replays of a ply we already hold are ignored
                if view.moves.last().map_or(0, |m| m.ply) >= last_move.ply {
                    return false;
                }
                view.fen = fen.clone();
                view.turn = *turn;
                view.clocks = *clocks;
                view.moves.push(last_move.clone());
                if let Some(result) = game_result {
                    view.status = SessionStatus::Ended;
                    view.result = Some(*result);
                }
                true
            }

            ServerEvent::GameEnded { game_id, result } => {
                let Some(view) = self.view_for_mut(game_id) else {
                    return false;
                };
                view.status = SessionStatus::Ended;
                view.result = Some(GameResult {
                    outcome: result.outcome,
                    reason: result.reason,
                });
                self.final_result = Some(result.clone());
                true
            }

            ServerEvent::PlayerDisconnected { game_id, role, .. } => {
                self.set_online(game_id, *role, false)
            }
            ServerEvent::OpponentReconnected { game_id, role, .. } => {
                self.set_online(game_id, *role, true)
            }

            _ => false,
        }
    }

    fn view_for_mut(&mut self, game_id: &SessionId) -> Option<&mut SessionView> {
        self.view.as_mut().filter(|view| &view.game_id == game_id)
    }

    fn set_online(&mut self, game_id: &SessionId, color: Color, online: bool) -> bool {
        let Some(view) = self.view_for_mut(game_id) else {
            return false;
        };
        match color {
            Color::White => view.white.online = online,
            Color::Black => view.black.online = online,
        }
        true
    }

    pub fn game_id(&self) -> Option<&SessionId> {
        self.view.as_ref().map(|view| &view.game_id)
    }

    pub fn role(&self) -> Option<Role> {
        self.view.as_ref().map(|view| view.role)
    }

    pub fn fen(&self) -> Option<&str> {
        self.view.as_ref().map(|view| view.fen.as_str())
    }

    pub fn turn(&self) -> Option<Color> {
        self.view.as_ref().map(|view| view.turn)
    }

    pub fn clocks(&self) -> Option<ClockSnapshot> {
        self.view.as_ref().map(|view| view.clocks)
    }

    pub fn moves(&self) -> &[MoveRecord] {
        self.view.as_ref().map_or(&[], |view| view.moves.as_slice())
    }

    pub fn is_over(&self) -> bool {
        self.view
            .as_ref()
            .is_some_and(|view| view.status == SessionStatus::Ended)
    }

    pub fn result(&self) -> Option<GameResult> {
        self.view.as_ref().and_then(|view| view.result)
    }

    /// Result with the winner's display name, once `game_ended` has arrived.
    pub fn final_result(&self) -> Option<&ResultView> {
        self.final_result.as_ref()
    }

    /// Always false for spectators and for finished games.
    pub fn is_my_turn(&self) -> bool {
        let Some(view) = &self.view else {
            return false;
        };
        view.status == SessionStatus::Active && view.role.color() == Some(view.turn)
    }

    /// Time left for this client's own side, if it plays.
    pub fn my_clock(&self) -> Option<i64> {
        let view = self.view.as_ref()?;
        match view.role.color()? {
            Color::White => Some(view.clocks.white),
            Color::Black => Some(view.clocks.black),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        EndReason, GameOutcome, PlayerInfo, SeatView, TimeControl, UserId, START_FEN,
    };

    fn seat(name: &str) -> SeatView {
        SeatView {
            player: PlayerInfo {
                user_id: UserId::new(name),
                username: name.to_string(),
                rating: 1500,
            },
            online: true,
        }
    }

    fn view(role: Role) -> SessionView {
        SessionView {
            game_id: SessionId::new("game_1"),
            white: seat("alice"),
            black: seat("bob"),
            fen: START_FEN.to_string(),
            moves: Vec::new(),
            turn: Color::White,
            clocks: ClockSnapshot {
                white: 180_000,
                black: 180_000,
            },
            time_control: TimeControl::new(180, 2),
            status: SessionStatus::Active,
            result: None,
            spectators: 0,
            role,
            is_your_turn: role.color().map(|c| c == Color::White),
        }
    }

    fn e4_played() -> ServerEvent {
        ServerEvent::MoveMade {
            game_id: SessionId::new("game_1"),
            fen: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string(),
            turn: Color::Black,
            clocks: ClockSnapshot {
                white: 181_000,
                black: 180_000,
            },
            last_move: MoveRecord {
                ply: 1,
                color: Color::White,
                san: "e4".into(),
                uci: "e2e4".into(),
                fen: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".into(),
            },
            game_result: None,
        }
    }

    #[test]
    fn test_empty_state() {
        let state = ClientGameState::new();
        assert!(state.game_id().is_none());
        assert!(!state.is_my_turn());
        assert!(state.moves().is_empty());
    }

    #[test]
    fn test_move_made_flips_turn() {
        let mut state = ClientGameState::new();
        state.apply(&ServerEvent::GameStarted(view(Role::White)));
        assert!(state.is_my_turn());

        assert!(state.apply(&e4_played()));
        assert!(!state.is_my_turn());
        assert_eq!(state.turn(), Some(Color::Black));
        assert_eq!(state.my_clock(), Some(181_000));
        assert_eq!(state.moves().len(), 1);

        // Same ply delivered twice is not appended again
        assert!(!state.apply(&e4_played()));
        assert_eq!(state.moves().len(), 1);
    }

    #[test]
    fn test_spectator_never_has_turn() {
        let mut state = ClientGameState::new();
        state.apply(&ServerEvent::GameJoined(view(Role::Spectator)));
        assert!(!state.is_my_turn());
        assert_eq!(state.my_clock(), None);
    }

    #[test]
    fn test_events_for_other_games_are_ignored() {
        let mut state = ClientGameState::new();
        state.apply(&ServerEvent::GameStarted(view(Role::Black)));

        let other = ServerEvent::GameEnded {
            game_id: SessionId::new("game_2"),
            result: ResultView {
                outcome: GameOutcome::Draw,
                reason: EndReason::Draw,
                winner: None,
            },
        };
        assert!(!state.apply(&other));
        assert!(!state.is_over());
    }

    #[test]
    fn test_game_ended_is_final() {
        let mut state = ClientGameState::new();
        state.apply(&ServerEvent::GameStarted(view(Role::White)));
        state.apply(&ServerEvent::GameEnded {
            game_id: SessionId::new("game_1"),
            result: ResultView {
                outcome: GameOutcome::BlackWin,
                reason: EndReason::Resignation,
                winner: Some("bob".into()),
            },
        });

        assert!(state.is_over());
        assert!(!state.is_my_turn());
        assert_eq!(
            state.result(),
            Some(GameResult::win(Color::Black, EndReason::Resignation))
        );
        assert_eq!(state.final_result().unwrap().winner.as_deref(), Some("bob"));
    }

    #[test]
    fn test_presence_updates() {
        let mut state = ClientGameState::new();
        state.apply(&ServerEvent::GameStarted(view(Role::White)));
        let gone = ServerEvent::PlayerDisconnected {
            game_id: SessionId::new("game_1"),
            role: Color::Black,
            username: "bob".into(),
        };
        assert!(state.apply(&gone));
        assert!(!state.view.as_ref().unwrap().black.online);

        let back = ServerEvent::OpponentReconnected {
            game_id: SessionId::new("game_1"),
            role: Color::Black,
            username: "bob".into(),
        };
        assert!(state.apply(&back));
        assert!(state.view.as_ref().unwrap().black.online);
    }
}
