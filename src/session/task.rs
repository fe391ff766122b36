//! Units of work a session executes one at a time, and the outcomes it
//! reports back to the server.

use super::state::{Lifecycle, Player, SessionId, SessionRefusal, SessionView};
use crate::client::{ClientId, ClientRef};
use chessfor4_rules::{MoveDescription, Team};
use tokio::sync::oneshot;

/// Work submitted to a session's queue.
///
/// Membership tasks always report a [`SessionOutcome`] to the server and may
/// also carry a oneshot reply for a caller that waits on the answer. A
/// dropped reply means the submitter stopped waiting.
#[derive(Debug)]
pub enum SessionTask {
    /// Send already encoded bytes to every seated player.
    Announce(Vec<u8>),
    /// Send the current state to every seated player.
    ShareState,
    /// Seat a player.
    Join {
        /// Player to seat.
        player: Player,
        /// Assigned seat or refusal.
        reply: Option<oneshot::Sender<Result<Team, SessionRefusal>>>,
    },
    /// Remove a client and report how many players remain.
    Leave {
        /// Departing client.
        client: ClientId,
        /// Players still seated.
        reply: Option<oneshot::Sender<usize>>,
    },
    /// Start the game.
    Start,
    /// Validate and apply a move.
    Move {
        /// Mover.
        client: ClientRef,
        /// Requested move.
        description: MoveDescription,
    },
    /// Move a player to another seat.
    ChangeSeat {
        /// Player.
        client: ClientRef,
        /// Seat number, 1-4.
        seat: u8,
    },
    /// Show a seated player under a new nickname.
    Rename {
        /// Player.
        client: ClientId,
        /// Nickname already deduplicated by the lobby.
        nick: String,
    },
    /// Return a snapshot of the session.
    Snapshot {
        /// Snapshot.
        reply: oneshot::Sender<SessionView>,
    },
}

/// Payload-free tag of a [`SessionTask`], used in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TaskKind {
    /// [`SessionTask::Announce`].
    Announce,
    /// [`SessionTask::ShareState`].
    ShareState,
    /// [`SessionTask::Join`].
    Join,
    /// [`SessionTask::Leave`].
    Leave,
    /// [`SessionTask::Start`].
    Start,
    /// [`SessionTask::Move`].
    Move,
    /// [`SessionTask::ChangeSeat`].
    ChangeSeat,
    /// [`SessionTask::Rename`].
    Rename,
    /// [`SessionTask::Snapshot`].
    Snapshot,
}

impl SessionTask {
    /// Returns the task's kind.
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Announce(_) => TaskKind::Announce,
            Self::ShareState => TaskKind::ShareState,
            Self::Join { .. } => TaskKind::Join,
            Self::Leave { .. } => TaskKind::Leave,
            Self::Start => TaskKind::Start,
            Self::Move { .. } => TaskKind::Move,
            Self::ChangeSeat { .. } => TaskKind::ChangeSeat,
            Self::Rename { .. } => TaskKind::Rename,
            Self::Snapshot { .. } => TaskKind::Snapshot,
        }
    }
}

/// A membership or lifecycle change a session reports to the server.
///
/// Sessions post these on an unbounded channel so a session worker never
/// waits on the dispatch worker. Outcomes from one session arrive in the
/// order its tasks ran.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// A join task ran.
    Joined {
        /// Session.
        session: SessionId,
        /// Client that asked to join.
        client: ClientRef,
        /// Assigned seat or refusal.
        result: Result<Team, SessionRefusal>,
    },
    /// A leave task ran.
    Left {
        /// Session.
        session: SessionId,
        /// Departing client.
        client: ClientId,
        /// Players still seated.
        remaining: usize,
    },
    /// The game moved to another lifecycle stage.
    LifecycleChanged {
        /// Session.
        session: SessionId,
        /// New stage.
        lifecycle: Lifecycle,
    },
}

impl SessionOutcome {
    /// Session that reported the outcome.
    pub fn session(&self) -> &SessionId {
        match self {
            Self::Joined { session, .. }
            | Self::Left { session, .. }
            | Self::LifecycleChanged { session, .. } => session,
        }
    }
}
