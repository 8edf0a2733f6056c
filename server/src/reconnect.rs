//! Reconnection and spectating.
//!
//! Players are recognised by durable user id, never by connection id, since a
//! page refresh opens a brand new socket. Joining or leaving only rebinds
//! connections and flips presence; position, clocks and result are never
//! touched here, and a disconnected player is not forfeited.

use crate::registry::PlayerIdentity;
use crate::session::{Presence, Session};
use log::info;
use shared::{Color, ConnectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The identity owns a side; that side is now bound to the new connection.
    Rejoined {
        color: Color,
        previous_connection: ConnectionId,
    },
    Spectating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    PlayerDisconnected(Color),
    SpectatorLeft,
    NotPresent,
}

impl Session {
    pub fn join(&mut self, identity: &PlayerIdentity) -> JoinOutcome {
        match self.side_of_user(&identity.user_id) {
            Some(color) => {
                // A player is never also listed as a spectator
                self.spectators.remove(&identity.connection_id);

                let slot = self.slot_mut(color);
                let previous_connection = slot.connection_id;
                slot.connection_id = identity.connection_id;
                slot.presence = Presence::Online;

                info!(
                    "{} rejoined game {} as {} on {}",
                    identity.username,
                    self.id(),
                    color,
                    identity.connection_id
                );
                JoinOutcome::Rejoined {
                    color,
                    previous_connection,
                }
            }
            None => {
                self.spectators.insert(identity.connection_id);
                JoinOutcome::Spectating
            }
        }
    }

    pub fn leave(&mut self, connection_id: ConnectionId) -> LeaveOutcome {
        if let Some(color) = self.side_of_connection(connection_id) {
            self.slot_mut(color).presence = Presence::Disconnected;
            LeaveOutcome::PlayerDisconnected(color)
        } else if self.spectators.remove(&connection_id) {
            LeaveOutcome::SpectatorLeft
        } else {
            LeaveOutcome::NotPresent
        }
    }
}
