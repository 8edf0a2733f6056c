use crate::game::ClientGameState;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{
    decode, encode, ClientEvent, MoveInput, PlayerInfo, ServerEvent, SessionId,
    TimeControlRequest, UserId,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL, e.g. `ws://127.0.0.1:8080`
    pub server_url: String,
    pub user_id: UserId,
    pub username: String,
    pub rating: Option<u32>,
    /// Base delay between reconnect attempts; attempt `n` waits `n` times this.
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(
        server_url: impl Into<String>,
        user_id: UserId,
        username: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            user_id,
            username: username.into(),
            rating: None,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Connection manager for one authenticated player.
///
/// Remembers the game it is attached to; if the socket drops it reconnects,
/// re-authenticates under the same user id and asks to rejoin that game.
pub struct ChessClient {
    config: ClientConfig,
    ws: WsStream,
    player_info: PlayerInfo,
    active_game_hint: Option<SessionId>,
    game: ClientGameState,
}

impl ChessClient {
    /// Connects and authenticates.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let mut ws = Self::open(&config.server_url).await?;
        let (player_info, active_game_hint) = Self::authenticate(&mut ws, &config).await?;

        Ok(ChessClient {
            config,
            ws,
            player_info,
            active_game_hint,
            game: ClientGameState::new(),
        })
    }

    async fn open(url: &str) -> ClientResult<WsStream> {
        info!("Connecting to {}...", url);
        let (ws, _) = connect_async(url).await?;
        Ok(ws)
    }

    async fn authenticate(
        ws: &mut WsStream,
        config: &ClientConfig,
    ) -> ClientResult<(PlayerInfo, Option<SessionId>)> {
        let request = ClientEvent::Authenticate {
            user_id: config.user_id.clone(),
            username: config.username.clone(),
            rating: config.rating,
        };
        ws.send(Message::Text(encode(&request)?.into())).await?;

        while let Some(msg) = ws.next().await {
            let Message::Text(text) = msg? else {
                continue;
            };
            match decode::<ServerEvent>(text.as_str())? {
                ServerEvent::Authenticated {
                    player_info,
                    active_game_id,
                    ..
                } => {
                    info!(
                        "Authenticated as {} ({})",
                        player_info.username, player_info.user_id
                    );
                    return Ok((player_info, active_game_id));
                }
                ServerEvent::Error { code, message } => {
                    return Err(format!("authentication rejected: {} ({})", message, code).into());
                }
                other => debug!("Ignoring {:?} before authentication", other),
            }
        }
        Err("connection closed during authentication".into())
    }

    pub fn player_info(&self) -> &PlayerInfo {
        &self.player_info
    }

    pub fn game(&self) -> &ClientGameState {
        &self.game
    }

    /// Game to rejoin: the one currently mirrored, else the one the server
    /// reported at authentication.
    pub fn current_game(&self) -> Option<&SessionId> {
        self.game.game_id().or(self.active_game_hint.as_ref())
    }

    pub async fn send(&mut self, event: &ClientEvent) -> ClientResult<()> {
        debug!("Sending {}", event.name());
        self.ws.send(Message::Text(encode(event)?.into())).await?;
        Ok(())
    }

    pub async fn join_matchmaking(&mut self, initial: u32, increment: u32) -> ClientResult<()> {
        let time_control = TimeControlRequest {
            initial,
            increment,
            kind: None,
        };
        self.send(&ClientEvent::JoinMatchmaking { time_control }).await
    }

    pub async fn leave_matchmaking(&mut self) -> ClientResult<()> {
        self.send(&ClientEvent::LeaveMatchmaking).await
    }

    pub async fn join_game(&mut self, game_id: SessionId) -> ClientResult<()> {
        self.send(&ClientEvent::JoinGame { game_id }).await
    }

    /// Sends a move for the current game. `time_left` is the mover's own
    /// clock reading; None lets the server charge elapsed time itself.
    pub async fn make_move(&mut self, mv: MoveInput, time_left: Option<i64>) -> ClientResult<()> {
        let game_id = self.require_game()?;
        self.send(&ClientEvent::MakeMove {
            game_id,
            mv,
            time_left,
        })
        .await
    }

    pub async fn resign(&mut self) -> ClientResult<()> {
        let game_id = self.require_game()?;
        self.send(&ClientEvent::Resign { game_id }).await
    }

    pub async fn chat(&mut self, message: impl Into<String>) -> ClientResult<()> {
        let game_id = self.require_game()?;
        self.send(&ClientEvent::ChatMessage {
            game_id,
            message: message.into(),
        })
        .await
    }

    fn require_game(&self) -> ClientResult<SessionId> {
        self.current_game()
            .cloned()
            .ok_or_else(|| "not attached to a game".into())
    }

    /// Waits for the next server event, reconnecting if the socket drops.
    pub async fn next_event(&mut self) -> ClientResult<ServerEvent> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let event = decode::<ServerEvent>(text.as_str())?;
                    self.game.apply(&event);
                    return Ok(event);
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!("Connection closed by server");
                    self.reconnect().await?;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Connection error: {}", e);
                    self.reconnect().await?;
                }
            }
        }
    }

    /// Replaces the socket with a fresh one, linear backoff between attempts.
    /// The old socket is dropped without a close handshake.
    pub async fn reconnect(&mut self) -> ClientResult<()> {
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            sleep(self.config.reconnect_delay * attempt).await;
            info!("Reconnect attempt {}/{}", attempt, MAX_RECONNECT_ATTEMPTS);

            let mut ws = match Self::open(&self.config.server_url).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", attempt, e);
                    continue;
                }
            };
            let (player_info, active_game_hint) =
                match Self::authenticate(&mut ws, &self.config).await {
                    Ok(auth) => auth,
                    Err(e) => {
                        warn!("Re-authentication failed: {}", e);
                        continue;
                    }
                };

            self.ws = ws;
            self.player_info = player_info;
            if active_game_hint.is_some() {
                self.active_game_hint = active_game_hint;
            }

            if let Some(game_id) = self.current_game().cloned() {
                info!("Rejoining game {}", game_id);
                self.send(&ClientEvent::ReconnectToGame { game_id }).await?;
            }
            return Ok(());
        }
        Err(format!("gave up after {} reconnect attempts", MAX_RECONNECT_ATTEMPTS).into())
    }

    pub async fn close(mut self) -> ClientResult<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
