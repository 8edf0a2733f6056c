//! FIFO matchmaking queue.
//!
//! Requesters are paired with the oldest waiting entry that has an identical
//! time control and a different user id. A connection holds at most one entry.

use crate::registry::PlayerIdentity;
use log::debug;
use rand::Rng;
use shared::{ConnectionId, TimeControl};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub identity: PlayerIdentity,
    pub time_control: TimeControl,
    pub enqueued_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No partner yet; the requester now waits at `position` (1-based).
    Queued { position: usize, queue_size: usize },
    /// The requester was paired with this previously waiting entry.
    Paired(QueueEntry),
}

#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: VecDeque<QueueEntry>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn enqueue(
        &mut self,
        identity: PlayerIdentity,
        time_control: TimeControl,
        now_ms: u64,
    ) -> MatchOutcome {
        // A repeated request from the same connection replaces its old entry
        self.dequeue(identity.connection_id);

        let partner = self.entries.iter().position(|entry| {
            entry.time_control == time_control && entry.identity.user_id != identity.user_id
        });

        if let Some(index) = partner {
            if let Some(entry) = self.entries.remove(index) {
                debug!(
                    "Paired {} with {} after {}ms in queue",
                    identity.username,
                    entry.identity.username,
                    now_ms.saturating_sub(entry.enqueued_at)
                );
                return MatchOutcome::Paired(entry);
            }
        }

        self.entries.push_back(QueueEntry {
            identity,
            time_control,
            enqueued_at: now_ms,
        });
        MatchOutcome::Queued {
            position: self.entries.len(),
            queue_size: self.entries.len(),
        }
    }

    /// Removes the entry for `connection_id`; a no-op if it is not queued.
    pub fn dequeue(&mut self, connection_id: ConnectionId) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.identity.connection_id == connection_id)?;
        self.entries.remove(index)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.identity.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unbiased coin flip deciding who plays white. Returns `(white, black)`.
pub fn assign_colors<R: Rng>(
    rng: &mut R,
    first: PlayerIdentity,
    second: PlayerIdentity,
) -> (PlayerIdentity, PlayerIdentity) {
    if rng.gen_bool(0.5) {
        (first, second)
    } else {
        (second, first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::UserId;

    fn identity(connection: u64, user: &str) -> PlayerIdentity {
        PlayerIdentity {
            connection_id: ConnectionId(connection),
            user_id: UserId::new(user),
            username: user.to_string(),
            rating: 1500,
        }
    }

    fn blitz() -> TimeControl {
        TimeControl::new(180, 2)
    }

    #[test]
    fn test_first_request_is_queued() {
        let mut queue = MatchmakingQueue::new();
        let outcome = queue.enqueue(identity(1, "alice"), blitz(), 0);

        assert_eq!(
            outcome,
            MatchOutcome::Queued {
                position: 1,
                queue_size: 1
            }
        );
        assert!(queue.contains(ConnectionId(1)));
    }

    #[test]
    fn test_pairs_oldest_compatible_entry() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(identity(1, "e1"), blitz(), 0);
        queue.enqueue(identity(2, "e2"), blitz(), 1);

        match queue.enqueue(identity(3, "e3"), blitz(), 2) {
            MatchOutcome::Paired(entry) => assert_eq!(entry.identity.user_id, UserId::new("e1")),
            other => panic!("Expected a pairing, got {:?}", other),
        }
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(ConnectionId(2)));
    }

    #[test]
    fn test_requires_exact_time_control() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(identity(1, "alice"), TimeControl::new(180, 0), 0);

        let outcome = queue.enqueue(identity(2, "bob"), blitz(), 1);
        assert!(matches!(outcome, MatchOutcome::Queued { position: 2, .. }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_never_pairs_same_user() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(identity(1, "alice"), blitz(), 0);

        // Same user on a second tab
        let outcome = queue.enqueue(identity(2, "alice"), blitz(), 1);
        assert!(matches!(outcome, MatchOutcome::Queued { .. }));

        // Self-match is skipped in favour of a later entry from someone else
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(identity(1, "alice"), blitz(), 0);
        queue.enqueue(identity(2, "bob"), blitz(), 1);
        match queue.enqueue(identity(3, "alice"), blitz(), 2) {
            MatchOutcome::Paired(entry) => assert_eq!(entry.identity.user_id, UserId::new("bob")),
            other => panic!("Expected a pairing, got {:?}", other),
        }
    }

    #[test]
    fn test_connection_holds_single_entry() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(identity(1, "alice"), blitz(), 0);
        queue.enqueue(identity(1, "alice"), TimeControl::new(600, 0), 1);

        assert_eq!(queue.len(), 1);
        let entry = queue.dequeue(ConnectionId(1)).unwrap();
        assert_eq!(entry.time_control, TimeControl::new(600, 0));
    }

    #[test]
    fn test_dequeue_unknown_is_noop() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(identity(1, "alice"), blitz(), 0);

        assert!(queue.dequeue(ConnectionId(7)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_assign_colors_uses_both_orders() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut first_white = 0;
        for _ in 0..200 {
            let (white, black) = assign_colors(&mut rng, identity(1, "a"), identity(2, "b"));
            assert_ne!(white.user_id, black.user_id);
            if white.user_id == UserId::new("a") {
                first_white += 1;
            }
        }
        assert!(first_white > 50 && first_white < 150);
    }
}
