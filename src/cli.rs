//! Command-line interface for chessfor4.

use clap::{Parser, Subcommand};

/// chessfor4 - four-player chess game server
#[derive(Parser, Debug)]
#[command(name = "chessfor4")]
#[command(about = "Four-player chess game server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Address to bind to, overrides the config file
        #[arg(long)]
        bind: Option<String>,

        /// Allow the owner to start before every seat is taken
        #[arg(long)]
        can_start_before_full: bool,
    },
}
