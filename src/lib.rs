//! chessfor4 - session and concurrency core of a four-player chess server
//!
//! Clients connect over WebSocket, pick a nickname, then create or join
//! games of up to four players.
//!
//! # Architecture
//!
//! - **Dispatch**: one worker owns the [`Server`] and handles inbound
//!   messages strictly in arrival order
//! - **Sessions**: every game runs on its own worker with a bounded task queue
//! - **Rules**: move legality lives in the `chessfor4_rules` crate
//! - **Events**: outcomes are reported to an injected [`EventSink`]
//!
//! # Example
//!
//! ```no_run
//! use chessfor4::{Dispatcher, JsonCommandHandler, Server, ServerConfig, TracingSink};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(ServerConfig::default(), Arc::new(TracingSink));
//! let dispatcher = Dispatcher::spawn(server, JsonCommandHandler);
//! let handle = dispatcher.handle();
//! // hand `handle` to a transport, later:
//! let server = dispatcher.shutdown().await?;
//! # drop((handle, server));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod events;
mod messages;
mod profile;
mod server;
mod session;
mod transport;

// Crate-level exports - Connections
pub use client::{ClientId, ClientRef, DeliveryFailure, deliver};

// Crate-level exports - Configuration and errors
pub use config::{ConfigError, ServerConfig};
pub use error::{ServerError, ServerErrorKind, SessionError, SessionErrorKind};

// Crate-level exports - Observability
pub use events::{CoreEvent, EventSink, Operation, RecordingSink, TracingSink};

// Crate-level exports - Wire format
pub use messages::{ClientCommand, GameListing, ListOfGames, ServerMessage, View};

// Crate-level exports - Server
pub use profile::{DEFAULT_NICK, Lobby, Profile};
pub use server::{
    CommandHandler, DirectoryEntry, DispatchItem, Dispatcher, Inbound, JsonCommandHandler, Server,
    ServerHandle, SessionDirectory,
};

// Crate-level exports - Sessions
pub use session::{
    GameSession, Lifecycle, MIN_PLAYERS, MoveOutcome, Player, PlayerView, SEATS, SessionActor,
    SessionHandle, SessionId, SessionOutcome, SessionRefusal, SessionSettings, SessionTask,
    SessionView, TaskKind,
};

// Crate-level exports - Transport
pub use transport::{TransportState, router};
