//! # Chess Client Library
//!
//! This library provides a headless client for the chess session server. It
//! keeps a WebSocket open to the server, speaks the shared JSON protocol, and
//! mirrors the state of the game the player is attached to.
//!
//! ## Architecture Overview
//!
//! The client never decides anything about a game. It proposes actions and
//! renders whatever the server broadcasts back, so the local mirror can never
//! diverge from the authoritative session for longer than one event.
//!
//! ### Durable Identity
//! The client authenticates with a stable user id. That id, not the socket,
//! is what binds the player to a side, which is what makes reconnection work.
//!
//! ### Transparent Reconnection
//! If the socket drops, [`network::ChessClient`] opens a new one with linear
//! backoff, authenticates again under the same user id and asks to rejoin the
//! game it was attached to. The server replies with a full snapshot, so the
//! mirror is rebuilt from scratch rather than patched.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Client-side mirror of one session:
//! - Full snapshot from `game_started`, `game_joined` and `game_rejoined`
//! - Incremental updates from `move_made` and presence events
//! - Final result from `game_ended`
//! - Turn check for player roles
//!
//! ### Network Module (`network`)
//! Manages all client-server communication:
//! - WebSocket connection and authentication
//! - Typed helpers for every client event
//! - Reconnect with backoff and automatic rejoin
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{ChessClient, ClientConfig};
//! use shared::{MoveInput, ServerEvent, UserId};
//!
//! # async fn play() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = ClientConfig::new("ws://127.0.0.1:8080", UserId::new("u-42"), "alice");
//! let mut client = ChessClient::connect(config).await?;
//!
//! // Wait for an opponent with the same 3+2 time control
//! client.join_matchmaking(180, 2).await?;
//!
//! loop {
//!     let event = client.next_event().await?;
//!     if let ServerEvent::GameEnded { .. } = event {
//!         break;
//!     }
//!     if client.game().is_my_turn() {
//!         client.make_move(MoveInput::text("e4"), None).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod network;
