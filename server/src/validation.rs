//! Protocol-boundary checks applied before an event reaches the engine.
//!
//! - Undecodable frame or unknown event: `invalid_request`
//! - Empty user id, username or game id: `invalid_request`
//! - Username longer than the protocol limit: `invalid_request`
//! - Empty or oversize chat message: `invalid_request`
//! - Reported clock beyond a day either side of zero: `invalid_request`
//!
//! Time controls are range-checked when a matchmaking request is handled.

use crate::error::EngineError;
use shared::{decode, ClientEvent, SessionId, MAX_USERNAME_LENGTH};

/// Largest `timeLeft` magnitude a client may report, in milliseconds.
pub const MAX_REPORTED_CLOCK_MS: i64 = 24 * 60 * 60 * 1000;

pub fn parse_client_event(text: &str) -> Result<ClientEvent, EngineError> {
    decode::<ClientEvent>(text)
        .map_err(|e| EngineError::InvalidRequest(format!("malformed event: {}", e)))
}

pub fn validate_event(event: &ClientEvent, max_chat_length: usize) -> Result<(), EngineError> {
    match event {
        ClientEvent::Authenticate {
            user_id, username, ..
        } => {
            if user_id.as_str().trim().is_empty() {
                return Err(invalid("userId must not be empty"));
            }
            let name_length = username.trim().chars().count();
            if name_length == 0 {
                return Err(invalid("username must not be empty"));
            }
            if name_length > MAX_USERNAME_LENGTH {
                return Err(invalid(&format!(
                    "username must be at most {} characters",
                    MAX_USERNAME_LENGTH
                )));
            }
            Ok(())
        }
        ClientEvent::JoinMatchmaking { .. } | ClientEvent::LeaveMatchmaking => Ok(()),
        ClientEvent::MakeMove {
            game_id, time_left, ..
        } => {
            require_game_id(game_id)?;
            match time_left {
                Some(ms) if ms.unsigned_abs() > MAX_REPORTED_CLOCK_MS as u64 => {
                    Err(invalid(&format!(
                        "timeLeft must be within {} ms",
                        MAX_REPORTED_CLOCK_MS
                    )))
                }
                _ => Ok(()),
            }
        }
        ClientEvent::JoinGame { game_id }
        | ClientEvent::ReconnectToGame { game_id }
        | ClientEvent::Resign { game_id } => require_game_id(game_id),
        ClientEvent::ChatMessage { game_id, message } => {
            require_game_id(game_id)?;
            let length = message.trim().chars().count();
            if length == 0 {
                return Err(invalid("message must not be empty"));
            }
            if length > max_chat_length {
                return Err(invalid(&format!(
                    "message must be at most {} characters",
                    max_chat_length
                )));
            }
            Ok(())
        }
    }
}

fn require_game_id(game_id: &SessionId) -> Result<(), EngineError> {
    if game_id.as_str().trim().is_empty() {
        Err(invalid("gameId must not be empty"))
    } else {
        Ok(())
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidRequest(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MoveInput, UserId};

    #[test]
    fn test_malformed_frames_are_invalid_requests() {
        for text in ["", "{", "[]", r#"{"event":"fly","data":{}}"#] {
            let err = parse_client_event(text).unwrap_err();
            assert_eq!(err.code(), "invalid_request", "frame {:?}", text);
        }
    }

    #[test]
    fn test_authenticate_requires_identity_fields() {
        let event = |user: &str, name: &str| ClientEvent::Authenticate {
            user_id: UserId::new(user),
            username: name.to_string(),
            rating: None,
        };

        assert!(validate_event(&event("u1", "alice"), 500).is_ok());
        assert!(validate_event(&event("", "alice"), 500).is_err());
        assert!(validate_event(&event("u1", "   "), 500).is_err());
        assert!(validate_event(&event("u1", &"x".repeat(MAX_USERNAME_LENGTH + 1)), 500).is_err());
    }

    #[test]
    fn test_game_id_required() {
        let event = ClientEvent::MakeMove {
            game_id: SessionId::new(""),
            mv: MoveInput::text("e4"),
            time_left: None,
        };
        assert_eq!(
            validate_event(&event, 500),
            Err(invalid("gameId must not be empty"))
        );
    }

    #[test]
    fn test_reported_clock_is_bounded() {
        let make_move = |time_left: Option<i64>| ClientEvent::MakeMove {
            game_id: SessionId::new("game_1"),
            mv: MoveInput::text("e4"),
            time_left,
        };

        assert!(validate_event(&make_move(None), 500).is_ok());
        assert!(validate_event(&make_move(Some(179_000)), 500).is_ok());
        assert!(validate_event(&make_move(Some(-250)), 500).is_ok());
        assert!(validate_event(&make_move(Some(MAX_REPORTED_CLOCK_MS)), 500).is_ok());
        for extreme in [MAX_REPORTED_CLOCK_MS + 1, i64::MAX, i64::MIN] {
            let err = validate_event(&make_move(Some(extreme)), 500).unwrap_err();
            assert_eq!(err.code(), "invalid_request", "timeLeft {}", extreme);
        }
    }

    #[test]
    fn test_chat_length_limits() {
        let chat = |message: &str| ClientEvent::ChatMessage {
            game_id: SessionId::new("game_1"),
            message: message.to_string(),
        };

        assert!(validate_event(&chat("good luck"), 10).is_ok());
        assert!(validate_event(&chat(""), 10).is_err());
        assert!(validate_event(&chat("this is far too long"), 10).is_err());
    }
}
