use clap::Parser;
use client::network::{ChessClient, ClientConfig};
use log::{info, warn};
use shared::{MoveInput, ServerEvent, SessionId, UserId, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 's', long, default_value_t = format!("ws://127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Durable user id; reconnecting with the same id resumes your games
    #[arg(short = 'u', long)]
    user_id: String,

    /// Display name
    #[arg(short = 'n', long)]
    username: String,

    /// Rating shown to opponents
    #[arg(short = 'r', long)]
    rating: Option<u32>,

    /// Initial time in seconds
    #[arg(short = 'i', long, default_value = "180")]
    initial: u32,

    /// Increment per move in seconds
    #[arg(long, default_value = "2")]
    increment: u32,

    /// Watch a game instead of queueing for one
    #[arg(long)]
    spectate: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = ClientConfig::new(&args.server, UserId::new(args.user_id), args.username);
    config.rating = args.rating;

    let mut client = ChessClient::connect(config).await?;

    if let Some(game_id) = args.spectate {
        client.join_game(SessionId::new(game_id)).await?;
    } else if let Some(game_id) = client.current_game().cloned() {
        info!("Resuming game {}", game_id);
        client.join_game(game_id).await?;
    } else {
        info!("Queueing for {}+{}", args.initial, args.increment);
        client.join_matchmaking(args.initial, args.increment).await?;
    }

    info!("Type a move (e4, Nf3, g1f3), 'chat <text>', 'resign' or 'quit'");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = client.next_event() => {
                let event = event?;
                print_event(&client, &event);
                if matches!(event, ServerEvent::GameEnded { .. }) {
                    break;
                }
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                let sent = match line {
                    "" => Ok(()),
                    "quit" => break,
                    "resign" => client.resign().await,
                    _ if line.starts_with("chat ") => client.chat(&line[5..]).await,
                    mv => client.make_move(MoveInput::text(mv), None).await,
                };
                if let Err(e) = sent {
                    warn!("Could not send: {}", e);
                }
            },
        }
    }

    client.close().await?;
    Ok(())
}

fn print_event(client: &ChessClient, event: &ServerEvent) {
    match event {
        ServerEvent::GameStarted(view) | ServerEvent::GameRejoined(view) => {
            println!(
                "Game {}: {} (white) vs {} (black). You are {:?}.",
                view.game_id, view.white.player.username, view.black.player.username, view.role
            );
        }
        ServerEvent::GameJoined(view) => {
            println!("Watching game {} ({} moves so far)", view.game_id, view.moves.len());
        }
        ServerEvent::MoveMade {
            last_move, clocks, ..
        } => {
            println!(
                "{}. {} ({})  white {}s  black {}s",
                (last_move.ply + 1) / 2,
                last_move.san,
                last_move.color,
                clocks.white / 1000,
                clocks.black / 1000
            );
            if client.game().is_my_turn() {
                println!("Your move.");
            }
        }
        ServerEvent::GameEnded { result, .. } => match &result.winner {
            Some(winner) => println!("Game over: {} wins by {:?}", winner, result.reason),
            None => println!("Game over: draw"),
        },
        ServerEvent::ChatMessage {
            username, message, ..
        } => println!("<{}> {}", username, message),
        ServerEvent::PlayerDisconnected { username, .. } => {
            println!("{} disconnected", username)
        }
        ServerEvent::OpponentReconnected { username, .. } => {
            println!("{} reconnected", username)
        }
        ServerEvent::Error { code, message } => println!("Rejected ({}): {}", code, message),
        other => info!("{:?}", other),
    }
}
