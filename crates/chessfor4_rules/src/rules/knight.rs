//! Knight movement.

use super::landing;
use crate::action::{MoveDescription, MoveError};
use crate::board::Board;
use crate::types::{Identity, Piece};
use tracing::instrument;

/// L-shaped jump; other pieces do not block it.
#[instrument(skip(board))]
pub fn check(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    let taken = landing(piece, board, description)?;
    let (dx, dy) = description.delta();
    match (dx.abs(), dy.abs()) {
        (1, 2) | (2, 1) => Ok(taken),
        _ => Err(MoveError::IllegalPattern(Identity::Knight)),
    }
}
