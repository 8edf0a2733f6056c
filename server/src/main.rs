use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// Main-method of the application.
/// Parses command-line arguments, then runs the session server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let config = ServerConfig::parse();
    info!(
        "Starting chess session server on {} (clock authority: {:?})",
        config.address(),
        config.clock_authority
    );

    let server = Server::bind(&config).await?;
    let handle = server.handle();
    let server_task = tokio::spawn(server.run());

    // Handle shutdown gracefully
    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server stopped with error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
        }
    }

    Ok(())
}
