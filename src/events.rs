//! Structured events emitted by the core.
//!
//! Outcomes of server and session operations are reported to an injected
//! [`EventSink`] instead of being logged in place. The server binary plugs in [`TracingSink`], tests
//! plug in [`RecordingSink`] and assert on the captured events.

use crate::client::{ClientId, DeliveryFailure};
use crate::session::{SessionId, TaskKind};
use chessfor4_rules::{Identity, MoveDescription, Team};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Server operation that failed to find its target session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Operation {
    /// Joining a game by id.
    JoinGame,
    /// Starting the game the client owns.
    StartGame,
    /// Moving a piece in the game the client plays.
    Move,
    /// Changing seat in the game the client plays.
    ChangeSeat,
}

/// Something the session core did or refused to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A client was seen for the first time.
    ProfileCreated {
        /// New profile's client.
        client: ClientId,
    },
    /// A nickname was assigned.
    NickAssigned {
        /// Client.
        client: ClientId,
        /// Nickname after deduplication.
        nick: String,
    },
    /// A profile left the lobby.
    ProfileRemoved {
        /// Client.
        client: ClientId,
    },
    /// A new game session was registered.
    SessionCreated {
        /// Session.
        session: SessionId,
        /// Title shown in listings.
        title: String,
    },
    /// An empty session was stopped and unregistered.
    SessionRemoved {
        /// Session.
        session: SessionId,
    },
    /// A lookup for the client's session found nothing.
    NotFound {
        /// Operation that was abandoned.
        operation: Operation,
        /// Client that asked.
        client: ClientId,
    },
    /// A client already seated somewhere tried to create or join a game.
    AlreadySeated {
        /// Client.
        client: ClientId,
        /// Session the client already plays in.
        session: SessionId,
    },
    /// A player took a seat.
    PlayerJoined {
        /// Session.
        session: SessionId,
        /// Client.
        client: ClientId,
        /// Seat assigned.
        team: Team,
    },
    /// A join attempt was refused.
    JoinRejected {
        /// Session.
        session: SessionId,
        /// Client.
        client: ClientId,
        /// Reason given to the client.
        reason: String,
    },
    /// A player left a session.
    PlayerLeft {
        /// Session.
        session: SessionId,
        /// Client.
        client: ClientId,
        /// Players still seated.
        remaining: usize,
    },
    /// The game moved from waiting to active.
    GameStarted {
        /// Session.
        session: SessionId,
        /// Team to move first.
        first: Team,
    },
    /// A start request did not satisfy the start policy.
    StartRefused {
        /// Session.
        session: SessionId,
        /// Why.
        reason: String,
    },
    /// A move was applied to the board.
    MoveApplied {
        /// Session.
        session: SessionId,
        /// Mover.
        client: ClientId,
        /// Move.
        description: MoveDescription,
        /// Identity of the captured piece, if any.
        captured: Option<Identity>,
    },
    /// A move was refused.
    MoveRejected {
        /// Session.
        session: SessionId,
        /// Mover.
        client: ClientId,
        /// Reason given to the mover.
        reason: String,
    },
    /// A team lost its king and left the rotation.
    TeamEliminated {
        /// Session.
        session: SessionId,
        /// Team.
        team: Team,
    },
    /// The game reached its end.
    GameFinished {
        /// Session.
        session: SessionId,
        /// Last team standing.
        winner: Option<Team>,
    },
    /// A player moved to another seat.
    SeatChanged {
        /// Session.
        session: SessionId,
        /// Client.
        client: ClientId,
        /// New seat.
        team: Team,
    },
    /// A seat change was refused.
    SeatRefused {
        /// Session.
        session: SessionId,
        /// Client.
        client: ClientId,
        /// Why.
        reason: String,
    },
    /// A task ran longer than the configured deadline.
    SlowTask {
        /// Session.
        session: SessionId,
        /// Kind of task.
        task: TaskKind,
        /// Wall-clock time spent.
        elapsed_ms: u64,
    },
    /// A queued task was dropped because the session stopped.
    TaskDiscarded {
        /// Session.
        session: SessionId,
        /// Kind of task.
        task: TaskKind,
    },
    /// An outbound message could not be queued for a client.
    DeliveryDropped {
        /// Client.
        client: ClientId,
        /// Why.
        reason: DeliveryFailure,
    },
    /// An inbound message could not be decoded.
    BadMessage {
        /// Client.
        client: ClientId,
        /// Decoder error.
        detail: String,
    },
}

/// Receives core events.
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Records one event.
    fn emit(&self, event: CoreEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CoreEvent) {
        match event {
            CoreEvent::ProfileCreated { client } => debug!(%client, "Profile created"),
            CoreEvent::NickAssigned { client, nick } => info!(%client, %nick, "Set profile nick"),
            CoreEvent::ProfileRemoved { client } => debug!(%client, "Profile removed from lobby"),
            CoreEvent::SessionCreated { session, title } => {
                info!(session_id = %session, %title, "Created game")
            }
            CoreEvent::SessionRemoved { session } => {
                info!(session_id = %session, "Game is empty. Removed game")
            }
            CoreEvent::NotFound { operation, client } => {
                warn!(%operation, %client, "No game found for client")
            }
            CoreEvent::AlreadySeated { client, session } => {
                warn!(%client, session_id = %session, "Client is already seated in a game")
            }
            CoreEvent::PlayerJoined {
                session,
                client,
                team,
            } => info!(session_id = %session, %client, %team, "Player joined game"),
            CoreEvent::JoinRejected {
                session,
                client,
                reason,
            } => warn!(session_id = %session, %client, %reason, "Could not join game"),
            CoreEvent::PlayerLeft {
                session,
                client,
                remaining,
            } => info!(session_id = %session, %client, remaining, "Player left game"),
            CoreEvent::GameStarted { session, first } => {
                info!(session_id = %session, %first, "Game started")
            }
            CoreEvent::StartRefused { session, reason } => {
                warn!(session_id = %session, %reason, "Game not started")
            }
            CoreEvent::MoveApplied {
                session,
                client,
                description,
                captured,
            } => debug!(
                session_id = %session,
                %client,
                %description,
                captured = ?captured,
                "Move applied"
            ),
            CoreEvent::MoveRejected {
                session,
                client,
                reason,
            } => debug!(session_id = %session, %client, %reason, "Move rejected"),
            CoreEvent::TeamEliminated { session, team } => {
                info!(session_id = %session, %team, "Team eliminated")
            }
            CoreEvent::GameFinished { session, winner } => {
                info!(session_id = %session, winner = ?winner, "Game finished")
            }
            CoreEvent::SeatChanged {
                session,
                client,
                team,
            } => debug!(session_id = %session, %client, %team, "Seat changed"),
            CoreEvent::SeatRefused {
                session,
                client,
                reason,
            } => debug!(session_id = %session, %client, %reason, "Seat change refused"),
            CoreEvent::SlowTask {
                session,
                task,
                elapsed_ms,
            } => warn!(session_id = %session, %task, elapsed_ms, "Session task exceeded deadline"),
            CoreEvent::TaskDiscarded { session, task } => {
                debug!(session_id = %session, %task, "Task discarded after stop")
            }
            CoreEvent::DeliveryDropped { client, reason } => {
                warn!(%client, %reason, "Dropped outbound message")
            }
            CoreEvent::BadMessage { client, detail } => {
                warn!(%client, %detail, "Could not decode message")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CoreEvent>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<CoreEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&CoreEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CoreEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
