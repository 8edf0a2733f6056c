//! Performance benchmarks for critical session-server paths

use server::config::ClockAuthority;
use server::matchmaking::{MatchOutcome, MatchmakingQueue};
use server::oracle::{ChessRules, MoveOracle};
use server::registry::PlayerIdentity;
use server::store::SessionStore;
use shared::{
    decode, encode, ClientEvent, ConnectionId, MoveInput, SessionId, TimeControl, UserId,
};
use std::time::Instant;

fn identity(n: u64) -> PlayerIdentity {
    PlayerIdentity {
        connection_id: ConnectionId(n),
        user_id: UserId::new(format!("user-{}", n)),
        username: format!("player{}", n),
        rating: 1500,
    }
}

/// Benchmarks pairing throughput across mixed time controls
#[test]
fn benchmark_matchmaking_pairing() {
    let controls = [
        TimeControl::new(60, 0),
        TimeControl::new(180, 2),
        TimeControl::new(600, 5),
        TimeControl::new(1800, 0),
    ];
    let iterations = 20_000u64;
    let mut queue = MatchmakingQueue::new();
    let mut pairs = 0;

    let start = Instant::now();
    for n in 0..iterations {
        let tc = controls[(n / 2) as usize % controls.len()];
        if let MatchOutcome::Paired(_) = queue.enqueue(identity(n), tc, n) {
            pairs += 1;
        }
    }
    let duration = start.elapsed();

    println!(
        "Matchmaking: {} requests in {:?} ({:.2} μs/request), {} pairs",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        pairs
    );

    assert_eq!(pairs, iterations / 2);
    assert!(queue.is_empty());
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks move validation through the oracle
#[test]
fn benchmark_oracle_apply() {
    let oracle = ChessRules;
    let start_position = oracle.initial_position();
    let iterations = 1_000;

    let start = Instant::now();
    for _ in 0..iterations {
        let verdict = oracle
            .apply(&start_position, &MoveInput::text("Nf3"))
            .unwrap();
        assert!(!verdict.is_checkmate);
    }
    let duration = start.elapsed();

    println!(
        "Oracle apply: {} moves in {:?} ({:.2} μs/move)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full move handling across many sessions, clocks included
#[test]
fn benchmark_session_moves() {
    let mut store = SessionStore::new();
    let sessions = 100u64;
    for n in 0..sessions {
        store.create_session(
            SessionId::new(format!("game_{}", n)),
            &identity(2 * n),
            &identity(2 * n + 1),
            TimeControl::new(600, 5),
            ChessRules.initial_position(),
            0,
        );
    }

    // Knights out and back twice: the start position occurs a third time
    let shuffle = ["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"];
    let mut applied = 0u64;

    let start = Instant::now();
    for n in 0..sessions {
        let session = store.get_mut(&SessionId::new(format!("game_{}", n))).unwrap();
        for (i, mv) in shuffle.iter().enumerate() {
            let conn = ConnectionId(2 * n + (i as u64 % 2));
            let now = (i as u64 + 1) * 1_000;
            session
                .apply_move(
                    conn,
                    &MoveInput::text(*mv),
                    None,
                    &ChessRules,
                    ClockAuthority::Server,
                    now,
                )
                .unwrap();
            applied += 1;
        }
    }
    let duration = start.elapsed();

    println!(
        "Session moves: {} applied in {:?} ({:.2} μs/move)",
        applied,
        duration,
        duration.as_micros() as f64 / applied as f64
    );

    assert_eq!(applied, sessions * shuffle.len() as u64);
    assert_eq!(store.active_count(), 0);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks wire decoding of inbound frames
#[test]
fn benchmark_event_decoding() {
    let frame = encode(&ClientEvent::MakeMove {
        game_id: SessionId::new("game_1700000000000_abcdefghi"),
        mv: MoveInput::text("Nf3"),
        time_left: Some(179_000),
    })
    .unwrap();
    let iterations = 20_000;

    let start = Instant::now();
    for _ in 0..iterations {
        let event: ClientEvent = decode(&frame).unwrap();
        assert_eq!(event.name(), "make_move");
    }
    let duration = start.elapsed();

    println!(
        "Event decoding: {} frames in {:?} ({:.2} ns/frame)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
