//! Error types for the session core.

use derive_more::{Display, Error};
use tracing::instrument;

/// Category of a [`ServerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ServerErrorKind {
    /// The dispatch queue no longer accepts items.
    #[display("dispatch queue closed")]
    QueueClosed,
    /// An outbound message could not be serialized.
    #[display("encoding failed")]
    Encode,
    /// The dispatch worker ended abnormally.
    #[display("dispatch worker failed")]
    WorkerFailed,
}

/// Server error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Server error ({}): {} at {}:{}", kind, message, file, line)]
pub struct ServerError {
    /// Category.
    pub kind: ServerErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ServerError {
    /// Creates a new server error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ServerErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(ServerErrorKind::Encode, format!("JSON error: {}", err))
    }
}

/// Category of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionErrorKind {
    /// The session was stopped; the task was not queued.
    #[display("session stopped")]
    Stopped,
    /// The session dropped a task before answering it.
    #[display("reply dropped")]
    ReplyDropped,
}

/// Session error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Session error ({}): {} at {}:{}", kind, message, file, line)]
pub struct SessionError {
    /// Category.
    pub kind: SessionErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
