//! # Chess Session Server Library
//!
//! This library provides the authoritative server for real-time two-player
//! chess. It pairs waiting players, owns every live game, validates moves,
//! keeps the clocks and pushes each change to the players and spectators of
//! the affected game.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Sessions
//! Every game lives on the server. Clients propose moves; the server checks
//! turn order and legality, updates clocks and decides when a game is over.
//! Clients only ever render what the server broadcasts.
//!
//! ### Identity and Reconnection
//! Players are recognised by a durable user id supplied at authentication,
//! not by their socket. A dropped player can reconnect from a new socket and
//! resume the same side of the same game. Disconnecting never forfeits.
//!
//! ### Fan-out
//! Every accepted move, resignation, chat line and presence change is sent to
//! all live connections attached to the game. Rejections are only ever sent
//! to the connection that caused them.
//!
//! ## Architecture Design
//!
//! ### Single Engine Loop
//! One task owns the [`engine::Engine`] and processes events strictly one at a
//! time. Connection tasks only decode frames and forward them over a channel,
//! so two moves for the same game can never interleave and no locks guard
//! session state.
//!
//! ### WebSocket Transport
//! Each client holds one WebSocket carrying JSON frames of the form
//! `{"event": "...", "data": {...}}`. Undecodable frames are answered on the
//! socket that sent them without reaching the engine.
//!
//! ### Pluggable Rules
//! Chess legality lives behind the [`oracle::MoveOracle`] trait. The default
//! [`oracle::ChessRules`] is backed by the `chess` crate; the engine itself
//! only understands turns, clocks and results.
//!
//! ## Module Organization
//!
//! - `registry`: live connections and the identity bound to each
//! - `matchmaking`: FIFO pairing queue keyed by exact time control
//! - `session`, `store`: per-game state, the move/clock engine and the game table
//! - `reconnect`: rejoining by user id and spectator attachment
//! - `broadcast`: per-game fan-out with role-shaped views
//! - `reaper`: periodic eviction of finished, idle games
//! - `engine`: event dispatch tying the above together
//! - `network`: listener, per-connection tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!
//!     // Binds the listener; the engine is created from the same config
//!     let server = Server::bind(&config).await?;
//!
//!     // Runs until shutdown:
//!     // - accepts WebSocket connections and decodes their frames
//!     // - dispatches each event to the engine in arrival order
//!     // - periodically evicts finished games past the retention window
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod matchmaking;
pub mod network;
pub mod oracle;
pub mod reaper;
pub mod reconnect;
pub mod registry;
pub mod session;
pub mod store;
pub mod utils;
pub mod validation;
