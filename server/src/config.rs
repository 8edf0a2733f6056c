use clap::{Parser, ValueEnum};
use shared::DEFAULT_PORT;
use std::time::Duration;

/// Who decides how much time a mover has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClockAuthority {
    /// Adopt the `timeLeft` the mover reports; fall back to server time if omitted.
    #[default]
    Client,
    /// Charge the mover for wall-clock time since the previous move.
    Server,
}

/// Server configuration, parsed from the command line.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time chess session server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of simultaneous connections
    #[arg(long, default_value_t = 1024)]
    pub max_connections: usize,

    /// Seconds between sweeps for stale finished games
    #[arg(long, default_value_t = 300)]
    pub reaper_interval_secs: u64,

    /// Seconds a finished game stays joinable before it is evicted
    #[arg(long, default_value_t = 1800)]
    pub session_retention_secs: u64,

    /// Source of truth for move clocks
    #[arg(long, value_enum, default_value_t = ClockAuthority::Client)]
    pub clock_authority: ClockAuthority,

    /// Longest accepted chat message, in characters
    #[arg(long, default_value_t = 500)]
    pub max_chat_length: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    pub fn retention_ms(&self) -> u64 {
        self.session_retention_secs.saturating_mul(1000)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.reaper_interval(), Duration::from_secs(300));
        assert_eq!(config.retention_ms(), 30 * 60 * 1000);
        assert_eq!(config.clock_authority, ClockAuthority::Client);
    }

    #[test]
    fn test_parse_overrides() {
        let config = ServerConfig::parse_from([
            "server",
            "--port",
            "9000",
            "--clock-authority",
            "server",
            "--session-retention-secs",
            "60",
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.clock_authority, ClockAuthority::Server);
        assert_eq!(config.retention_ms(), 60_000);
    }
}
