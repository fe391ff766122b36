//! King movement.

use super::landing;
use crate::action::{MoveDescription, MoveError};
use crate::board::Board;
use crate::types::{Identity, Piece};
use tracing::instrument;

/// One step in any direction. Check is not evaluated.
#[instrument(skip(board))]
pub fn check(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    let taken = landing(piece, board, description)?;
    let (dx, dy) = description.delta();
    if dx.abs() <= 1 && dy.abs() <= 1 {
        Ok(taken)
    } else {
        Err(MoveError::IllegalPattern(Identity::King))
    }
}
