//! Bishop, rook and queen movement.

use super::{landing, path_clear};
use crate::action::{MoveDescription, MoveError};
use crate::board::Board;
use crate::types::Piece;
use tracing::instrument;

fn is_diagonal(description: &MoveDescription) -> bool {
    let (dx, dy) = description.delta();
    dx != 0 && dx.abs() == dy.abs()
}

fn is_orthogonal(description: &MoveDescription) -> bool {
    let (dx, dy) = description.delta();
    (dx == 0) != (dy == 0)
}

fn slide(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
    shape_ok: bool,
) -> Result<Option<Piece>, MoveError> {
    let taken = landing(piece, board, description)?;
    if !shape_ok {
        return Err(MoveError::IllegalPattern(piece.identity()));
    }
    path_clear(board, description.from, description.to)?;
    Ok(taken)
}

/// Diagonal slide.
#[instrument(skip(board))]
pub fn check_bishop(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    slide(piece, board, description, is_diagonal(description))
}

/// Orthogonal slide.
#[instrument(skip(board))]
pub fn check_rook(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    slide(piece, board, description, is_orthogonal(description))
}

/// Rook or bishop slide.
#[instrument(skip(board))]
pub fn check_queen(
    piece: &Piece,
    board: &Board,
    description: &MoveDescription,
) -> Result<Option<Piece>, MoveError> {
    let shape_ok = is_diagonal(description) || is_orthogonal(description);
    slide(piece, board, description, shape_ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Identity, Position, Team};

    fn mv(from: (i32, i32), to: (i32, i32)) -> MoveDescription {
        MoveDescription::new(Position::new(from.0, from.1), Position::new(to.0, to.1))
    }

    #[test]
    fn test_rook_blocked_by_own_pawn_at_start() {
        let board = Board::standard();
        let rook = Piece::new(Identity::Rook, Position::new(3, 13), Team::South);
        let err = check_rook(&rook, &board, &mv((3, 13), (3, 9))).expect_err("blocked");
        assert_eq!(err, MoveError::PathBlocked(Position::new(3, 12)));
    }

    #[test]
    fn test_rook_captures_enemy_at_end_of_clear_file() {
        let mut board = Board::empty();
        let rook = Piece::new(Identity::Rook, Position::new(5, 10), Team::South);
        board.place(rook);
        board.place(Piece::new(Identity::Knight, Position::new(5, 4), Team::North));

        let taken = check_rook(&rook, &board, &mv((5, 10), (5, 4))).expect("legal");
        assert_eq!(taken.map(|p| p.identity()), Some(Identity::Knight));
        assert!(check_rook(&rook, &board, &mv((5, 10), (6, 9))).is_err());
    }

    #[test]
    fn test_bishop_diagonals_only() {
        let mut board = Board::empty();
        let bishop = Piece::new(Identity::Bishop, Position::new(6, 6), Team::West);
        board.place(bishop);
        assert!(check_bishop(&bishop, &board, &mv((6, 6), (9, 9))).is_ok());
        assert!(check_bishop(&bishop, &board, &mv((6, 6), (6, 9))).is_err());
    }

    #[test]
    fn test_queen_combines_both() {
        let mut board = Board::empty();
        let queen = Piece::new(Identity::Queen, Position::new(6, 6), Team::East);
        board.place(queen);
        assert!(check_queen(&queen, &board, &mv((6, 6), (3, 3))).is_ok());
        assert!(check_queen(&queen, &board, &mv((6, 6), (6, 12))).is_ok());
        assert!(check_queen(&queen, &board, &mv((6, 6), (7, 8))).is_err());
    }
}
