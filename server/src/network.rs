//! Server network layer: WebSocket connections feeding a single engine loop

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reaper;
use crate::registry::EventSender;
use crate::utils::get_timestamp;
use crate::validation::parse_client_event;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{encode, ClientEvent, ConnectionId, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

type WsSink = Arc<Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionOpened {
        addr: SocketAddr,
        sender: EventSender,
        reply: oneshot::Sender<Option<ConnectionId>>,
    },
    EventReceived {
        connection_id: ConnectionId,
        event: ClientEvent,
    },
    ConnectionClosed {
        connection_id: ConnectionId,
    },
    Shutdown,
}

/// Cloneable handle for stopping a running server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server owning the listener and the session engine
pub struct Server {
    listener: TcpListener,
    engine: Engine,
    reaper_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(
        config: &ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::with_engine(config, Engine::new(config)).await
    }

    pub async fn with_engine(
        config: &ServerConfig,
        engine: Engine,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            engine,
            reaper_interval: config.reaper_interval(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that accepts sockets and starts a handler per connection
    fn spawn_acceptor(
        listener: TcpListener,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, server_tx).await {
                                warn!("Connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Main server loop. All engine state is touched from here only.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Server {
            listener,
            mut engine,
            reaper_interval,
            server_tx,
            mut server_rx,
        } = self;

        let acceptor = Self::spawn_acceptor(listener, server_tx.clone());
        let mut reaper_timer = reaper::schedule(reaper_interval).await;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ConnectionOpened { addr, sender, reply }) => {
                            let connection_id = engine.connection_opened(addr, sender);
                            if connection_id.is_none() {
                                warn!("Rejecting {}: server full", addr);
                            }
                            let _ = reply.send(connection_id);
                        },
                        Some(ServerMessage::EventReceived { connection_id, event }) => {
                            engine.handle_event(connection_id, event, get_timestamp());
                        },
                        Some(ServerMessage::ConnectionClosed { connection_id }) => {
                            engine.connection_closed(connection_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = reaper_timer.tick() => {
                    engine.reap(get_timestamp());
                    debug!(
                        "{} connections ({} authenticated), {} games ({} active), {} queued",
                        engine.registry().len(),
                        engine.registry().authenticated_count(),
                        engine.store().len(),
                        engine.store().active_count(),
                        engine.queue().len()
                    );
                },
            }
        }

        acceptor.abort();
        Ok(())
    }
}

/// Drives one WebSocket from handshake to close.
///
/// Inbound frames are decoded here; undecodable ones are answered on this
/// socket without involving the engine. Outbound events arrive on a private
/// channel whose sender is registered with the engine.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender: WsSink = Arc::new(Mutex::new(ws_sender));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (reply_tx, reply_rx) = oneshot::channel();
    server_tx
        .send(ServerMessage::ConnectionOpened {
            addr,
            sender: event_tx.clone(),
            reply: reply_tx,
        })
        .map_err(|_| "server loop stopped")?;

    let Some(connection_id) = reply_rx.await? else {
        let rejection = EngineError::InvalidRequest("server full".to_string()).to_event();
        let mut sink = ws_sender.lock().await;
        sink.send(Message::Text(encode(&rejection)?.into())).await?;
        sink.close().await?;
        return Ok(());
    };

    let incoming_task = {
        let ws_sender = Arc::clone(&ws_sender);
        let server_tx = server_tx.clone();

        async move {
            while let Some(msg) = ws_receiver.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(_)) => {
                        let e = EngineError::InvalidRequest("binary frames are not supported".into());
                        let _ = event_tx.send(e.to_event());
                        continue;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Connection {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut sink = ws_sender.lock().await;
                        let _ = sink.send(Message::Pong(data)).await;
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                };

                match parse_client_event(text.as_str()) {
                    Ok(event) => {
                        let message = ServerMessage::EventReceived {
                            connection_id,
                            event,
                        };
                        if server_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("Connection {} sent a bad frame: {}", connection_id, e);
                        let _ = event_tx.send(e.to_event());
                    }
                }
            }
        }
    };

    let outgoing_task = {
        let ws_sender = Arc::clone(&ws_sender);
        async move {
            while let Some(event) = event_rx.recv().await {
                let text = match encode(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode event for {}: {}", connection_id, e);
                        continue;
                    }
                };
                let mut sink = ws_sender.lock().await;
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!("Failed to send to connection {}: {}", connection_id, e);
                    break;
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    info!("Connection {} from {} closed", connection_id, addr);
    let _ = server_tx.send(ServerMessage::ConnectionClosed { connection_id });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_handle_stops_run_loop() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config).await.unwrap();
        let handle = server.handle();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let running = tokio::spawn(server.run());
        handle.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("server did not stop");
        tokio_test::assert_ok!(result.unwrap());
    }

    #[test]
    fn test_server_message_carries_connection_id() {
        let msg = ServerMessage::ConnectionClosed {
            connection_id: ConnectionId(7),
        };
        match msg {
            ServerMessage::ConnectionClosed { connection_id } => {
                assert_eq!(connection_id, ConnectionId(7))
            }
            _ => panic!("Wrong message type"),
        }
    }
}
