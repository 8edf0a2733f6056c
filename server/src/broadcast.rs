//! Fan-out of session events to players and spectators.
//!
//! Delivery is best-effort: recipients whose connection is no longer live are
//! skipped silently, and nothing is queued for redelivery. The broadcaster only
//! reads session state.

use crate::registry::ConnectionRegistry;
use crate::session::Session;
use shared::{ConnectionId, ServerEvent, SessionView};

pub struct Broadcaster<'a> {
    registry: &'a ConnectionRegistry,
}

impl<'a> Broadcaster<'a> {
    pub fn new(registry: &'a ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        self.registry.send(connection_id, event)
    }

    /// Sends the same event to every live recipient of `session`.
    /// Returns how many connections it was delivered to.
    pub fn broadcast(
        &self,
        session: &Session,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        self.live_recipients(session, exclude)
            .filter(|id| self.registry.send(*id, event.clone()))
            .count()
    }

    /// Renders a full session view per recipient, with `role` computed for each.
    pub fn broadcast_views<F>(
        &self,
        session: &Session,
        wrap: F,
        exclude: Option<ConnectionId>,
    ) -> usize
    where
        F: Fn(SessionView) -> ServerEvent,
    {
        self.live_recipients(session, exclude)
            .filter(|id| {
                let view = session.view_for(session.role_of(*id));
                self.registry.send(*id, wrap(view))
            })
            .count()
    }

    fn live_recipients<'s>(
        &'s self,
        session: &'s Session,
        exclude: Option<ConnectionId>,
    ) -> impl Iterator<Item = ConnectionId> + 's {
        session
            .recipients()
            .into_iter()
            .filter(move |id| Some(*id) != exclude && self.registry.is_live(*id))
    }
}
