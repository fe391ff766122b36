//! Pawn movement.

use super::landing;
use crate::action::{MoveDescription, MoveError};
use crate::board::Board;
use crate::types::{Identity, Piece};
use tracing::instrument;

/// One step forward onto an empty square, two from the start rank, or one
/// diagonal-forward step onto an enemy piece.
#[instrument(skip(board))]
pub fn check(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    let taken = landing(piece, board, description)?;
    let team = piece.team();
    let (fx, fy) = team.forward();
    let from = description.from;
    let to = description.to;

    let one = from.offset(fx, fy);
    if to == one {
        return match taken {
            None => Ok(None),
            Some(_) => Err(MoveError::PathBlocked(to)),
        };
    }

    let two = from.offset(2 * fx, 2 * fy);
    if to == two && team.rank_of(from) == team.pawn_rank() {
        if !board.is_empty(one) {
            return Err(MoveError::PathBlocked(one));
        }
        return match taken {
            None => Ok(None),
            Some(_) => Err(MoveError::PathBlocked(to)),
        };
    }

    // Diagonals are the forward step shifted one square sideways.
    let (sx, sy) = (fy, fx);
    let diagonal = to == one.offset(sx, sy) || to == one.offset(-sx, -sy);
    if diagonal && taken.is_some() {
        return Ok(taken);
    }

    Err(MoveError::IllegalPattern(Identity::Pawn))
}
