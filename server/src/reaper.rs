//! Periodic eviction of finished, idle sessions.
//!
//! Only sessions whose status is `ended` are ever eligible. An abandoned but
//! active game stays in the store until someone ends it.

use crate::store::SessionStore;
use log::info;
use shared::SessionId;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Removes ended sessions idle for longer than `retention_ms`.
pub fn sweep(store: &mut SessionStore, now_ms: u64, retention_ms: u64) -> Vec<SessionId> {
    let expired: Vec<SessionId> = store
        .iter()
        .filter(|session| {
            !session.is_active()
                && now_ms.saturating_sub(session.last_activity_at()) > retention_ms
        })
        .map(|session| session.id().clone())
        .collect();

    for id in &expired {
        store.remove(id);
    }

    if !expired.is_empty() {
        info!(
            "Reaped {} finished game(s), {} remain",
            expired.len(),
            store.len()
        );
    }
    expired
}

/// Sweep timer. The first tick is consumed so the initial sweep happens one
/// full period after startup.
pub async fn schedule(period: Duration) -> Interval {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer.tick().await;
    timer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::identity;
    use shared::{ConnectionId, TimeControl, START_FEN};

    const MINUTE: u64 = 60_000;
    const RETENTION: u64 = 30 * MINUTE;

    fn store_with(ids: &[&str]) -> SessionStore {
        let mut store = SessionStore::new();
        for id in ids {
            store.create_session(
                SessionId::new(*id),
                &identity(1, "alice"),
                &identity(2, "bob"),
                TimeControl::new(300, 0),
                START_FEN.to_string(),
                0,
            );
        }
        store
    }

    #[test]
    fn test_active_sessions_are_never_reaped() {
        let mut store = store_with(&["game_a"]);
        let reaped = sweep(&mut store, 1_000 * RETENTION, RETENTION);

        assert!(reaped.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ended_sessions_reaped_after_retention() {
        let mut store = store_with(&["game_a", "game_b"]);
        store
            .get_mut(&SessionId::new("game_a"))
            .unwrap()
            .resign(ConnectionId(1), 0)
            .unwrap();

        assert!(sweep(&mut store, RETENTION, RETENTION).is_empty());
        assert_eq!(store.len(), 2);

        let reaped = sweep(&mut store, RETENTION + 1, RETENTION);
        assert_eq!(reaped, vec![SessionId::new("game_a")]);
        assert!(store.contains(&SessionId::new("game_b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_skips_immediate_tick() {
        let start = tokio::time::Instant::now();
        let mut timer = schedule(Duration::from_secs(300)).await;
        timer.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(300));
    }
}
