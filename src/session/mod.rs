//! Game sessions: state, tasks and the per-session worker.

mod actor;
mod state;
mod task;

pub use actor::{SessionActor, SessionHandle, SessionSettings};
pub use state::{
    GameSession, Lifecycle, MIN_PLAYERS, MoveOutcome, Player, PlayerView, SEATS, SessionId,
    SessionRefusal, SessionView,
};
pub use task::{SessionOutcome, SessionTask, TaskKind};
