use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::SessionId;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Session ids are derived from creation time plus a random suffix
pub fn generate_session_id<R: Rng>(rng: &mut R, now_ms: u64) -> SessionId {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    SessionId::new(format!("game_{}_{}", now_ms, suffix))
}
