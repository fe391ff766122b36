//! Move legality rules for four-player chess.
//!
//! Every function here is pure: it reads the board and answers whether a
//! move is allowed, never mutating anything. One rule function exists per
//! piece identity; identities without a rule are rejected.

pub mod king;
pub mod knight;
pub mod pawn;
pub mod sliding;

use crate::action::{MoveDescription, MoveError, MoveVerdict};
use crate::board::Board;
use crate::types::{Identity, Piece, Position, Team};
use tracing::{instrument, warn};

/// Checks whether `team` may perform `description` with `piece`.
///
/// Returns the verdict with the captured piece, if any.
#[instrument(skip(board))]
pub fn is_move_possible(
    team: Team,
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> MoveVerdict {
    if piece.team() != team {
        return MoveVerdict::reject(MoveError::NotYourPiece(piece.team()));
    }
    let result = match piece.identity() {
        Identity::Pawn => pawn::check(piece, board, description),
        Identity::Knight => knight::check(piece, board, description),
        Identity::Bishop => sliding::check_bishop(piece, board, description),
        Identity::Rook => sliding::check_rook(piece, board, description),
        Identity::Queen => sliding::check_queen(piece, board, description),
        Identity::King => king::check(piece, board, description),
        Identity::Unknown => {
            warn!(from = %description.from, "Identity not implemented. Cannot check isMovePossible");
            Err(MoveError::UnimplementedIdentity)
        }
    };
    MoveVerdict::from(result)
}

/// Validates the destination square and returns the enemy piece on it.
pub(crate) fn landing(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    if !description.to.is_on_board() {
        return Err(MoveError::OffBoard(description.to));
    }
    if description.from == description.to {
        return Err(MoveError::SameSquare);
    }
    match board.piece_at(description.to) {
        Some(occupant) if occupant.team() == piece.team() => {
            Err(MoveError::OwnPiece(description.to))
        }
        Some(occupant) => Ok(Some(*occupant)),
        None => Ok(None),
    }
}

/// Walks from `from` towards `to` in unit steps and fails on the first
/// occupied square strictly between them.
pub(crate) fn path_clear(board: &Board, from: Position, to: Position) -> Result<(), MoveError> {
    let step = ((to.x - from.x).signum(), (to.y - from.y).signum());
    let mut current = from.offset(step.0, step.1);
    while current != to {
        if !current.is_on_board() || !board.is_empty(current) {
            return Err(MoveError::PathBlocked(current));
        }
        current = current.offset(step.0, step.1);
    }
    Ok(())
}
