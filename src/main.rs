//! chessfor4 - game server binary
//!
//! Loads configuration, starts the dispatch worker and serves WebSocket
//! clients until interrupted.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use chessfor4::{Dispatcher, JsonCommandHandler, Server, ServerConfig, TracingSink, TransportState};
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chessfor4=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            bind,
            can_start_before_full,
        } => serve(config, bind, can_start_before_full).await,
    }
}

/// Run the WebSocket game server
#[instrument]
async fn serve(
    config_path: Option<PathBuf>,
    bind: Option<String>,
    can_start_before_full: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = bind {
        config = config.with_bind(bind);
    }
    if can_start_before_full {
        config = config.with_can_start_before_full(true);
    }
    config.validate()?;

    let send_capacity = *config.client_send_capacity();
    let address = config.bind().clone();
    let server = Server::new(config, Arc::new(TracingSink));
    let dispatcher = Dispatcher::spawn(server, JsonCommandHandler);
    let app = chessfor4::router(TransportState::new(dispatcher.handle(), send_capacity));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "Server listening on ws://{}/ws", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    let server = dispatcher.shutdown().await?;
    info!(profiles = server.lobby().len(), "Server stopped");
    Ok(())
}
