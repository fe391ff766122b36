//! Move descriptions and the verdicts the oracle hands back.

use crate::types::{Identity, Piece, Position};
use serde::{Deserialize, Serialize};

/// What a player asks to do: move whatever stands on `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveDescription {
    /// Square the moving piece stands on.
    pub from: Position,
    /// Square the piece should end up on.
    pub to: Position,
}

impl MoveDescription {
    /// Creates a move description.
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }

    /// Column and row distance travelled.
    pub fn delta(&self) -> (i32, i32) {
        (self.to.x - self.from.x, self.to.y - self.from.y)
    }
}

impl std::fmt::Display for MoveDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Reason a move was refused.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// Destination is outside the cross-shaped board.
    #[display("Square {} is not on the board", _0)]
    OffBoard(Position),

    /// Source and destination are the same square.
    #[display("Piece must leave its square")]
    SameSquare,

    /// The piece belongs to another team.
    #[display("That piece belongs to team {}", _0)]
    NotYourPiece(crate::Team),

    /// Destination holds one of the mover's own pieces.
    #[display("Square {} is occupied by your own piece", _0)]
    OwnPiece(Position),

    /// A sliding piece would jump over another piece.
    #[display("Path is blocked at {}", _0)]
    PathBlocked(Position),

    /// The geometry does not match how this piece moves.
    #[display("A {} cannot move like that", _0)]
    IllegalPattern(Identity),

    /// No rule function exists for this identity.
    #[display("Identity not implemented. Cannot check isMovePossible")]
    UnimplementedIdentity,
}

impl std::error::Error for MoveError {}

/// Outcome of asking the oracle about one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveVerdict {
    allowed: bool,
    taken: Option<Piece>,
    message: String,
}

impl MoveVerdict {
    /// A legal move, possibly capturing `taken`.
    pub fn allow(taken: Option<Piece>) -> Self {
        let message = match &taken {
            Some(piece) => format!("Captured {} of team {}", piece.identity(), piece.team()),
            None => String::new(),
        };
        Self {
            allowed: true,
            taken,
            message,
        }
    }

    /// An illegal move.
    pub fn reject(error: MoveError) -> Self {
        Self {
            allowed: false,
            taken: None,
            message: error.to_string(),
        }
    }

    /// Returns true if the move may be applied.
    pub fn allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the piece the move would capture.
    pub fn taken(&self) -> Option<&Piece> {
        self.taken.as_ref()
    }

    /// Human-readable explanation.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Result<Option<Piece>, MoveError>> for MoveVerdict {
    fn from(result: Result<Option<Piece>, MoveError>) -> Self {
        match result {
            Ok(taken) => Self::allow(taken),
            Err(e) => Self::reject(e),
        }
    }
}
