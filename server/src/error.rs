//! Rejection taxonomy for engine operations.
//!
//! Every variant is local and recoverable: it is reported to the single
//! requesting connection and the session it concerned is left untouched.

use shared::ServerEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("authentication required")]
    NotAuthenticated,

    #[error("game not found")]
    SessionNotFound,

    #[error("not your turn")]
    NotYourTurn,

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("game is already over")]
    SessionOver,

    #[error("you are not a player in this game")]
    NotAParticipant,

    /// Rejected at the protocol boundary before reaching the engine.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotAuthenticated => "not_authenticated",
            EngineError::SessionNotFound => "session_not_found",
            EngineError::NotYourTurn => "not_your_turn",
            EngineError::IllegalMove(_) => "illegal_move",
            EngineError::SessionOver => "session_over",
            EngineError::NotAParticipant => "not_a_participant",
            EngineError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(EngineError::NotAuthenticated.code(), "not_authenticated");
        assert_eq!(EngineError::SessionNotFound.code(), "session_not_found");
        assert_eq!(EngineError::NotYourTurn.code(), "not_your_turn");
        assert_eq!(EngineError::IllegalMove("e5e4".into()).code(), "illegal_move");
        assert_eq!(EngineError::SessionOver.code(), "session_over");
        assert_eq!(EngineError::NotAParticipant.code(), "not_a_participant");
    }

    #[test]
    fn test_error_event_carries_code_and_message() {
        match EngineError::IllegalMove("Ke9".into()).to_event() {
            ServerEvent::Error { code, message } => {
                assert_eq!(code, "illegal_move");
                assert_eq!(message, "illegal move: Ke9");
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}
