//! Board storage for four-player chess.

use crate::types::{BOARD_SIZE, CORNER_SIZE, Identity, Piece, Position, Team};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Back rank order, read from the left of the team's own point of view.
const BACK_RANK: [Identity; 8] = [
    Identity::Rook,
    Identity::Knight,
    Identity::Bishop,
    Identity::Queen,
    Identity::King,
    Identity::Bishop,
    Identity::Knight,
    Identity::Rook,
];

/// The pieces currently standing on the board.
///
/// Pieces are kept in insertion order so the serialized form is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Board {
    pieces: Vec<Piece>,
}

impl Board {
    /// Creates a board with no pieces.
    #[instrument]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates the standard four-player starting position.
    #[instrument]
    pub fn standard() -> Self {
        let mut board = Self::empty();
        let far = BOARD_SIZE - 1;
        for (offset, identity) in BACK_RANK.iter().copied().enumerate() {
            let i = CORNER_SIZE + offset as i32;
            let mirrored = far - i;
            board.place(Piece::new(identity, Position::new(i, far), Team::South));
            board.place(Piece::new(Identity::Pawn, Position::new(i, far - 1), Team::South));
            board.place(Piece::new(identity, Position::new(0, i), Team::West));
            board.place(Piece::new(Identity::Pawn, Position::new(1, i), Team::West));
            board.place(Piece::new(identity, Position::new(mirrored, 0), Team::North));
            board.place(Piece::new(Identity::Pawn, Position::new(mirrored, 1), Team::North));
            board.place(Piece::new(identity, Position::new(far, mirrored), Team::East));
            board.place(Piece::new(Identity::Pawn, Position::new(far - 1, mirrored), Team::East));
        }
        board
    }

    /// Places a piece, replacing whatever stood on its square.
    pub fn place(&mut self, piece: Piece) {
        self.pieces.retain(|p| p.position() != piece.position());
        self.pieces.push(piece);
    }

    /// Returns the piece on `position`, if any.
    pub fn piece_at(&self, position: Position) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.position() == position)
    }

    /// Returns true if no piece stands on `position`.
    pub fn is_empty(&self, position: Position) -> bool {
        self.piece_at(position).is_none()
    }

    /// Returns all pieces.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Removes and returns the piece on `position`.
    pub fn remove_at(&mut self, position: Position) -> Option<Piece> {
        let index = self.pieces.iter().position(|p| p.position() == position)?;
        Some(self.pieces.remove(index))
    }

    /// Removes every piece of `team`.
    #[instrument(skip(self))]
    pub fn remove_team(&mut self, team: Team) -> usize {
        let before = self.pieces.len();
        self.pieces.retain(|p| p.team() != team);
        before - self.pieces.len()
    }

    /// Moves the piece on `from` to `to`, removing any piece on `to`.
    ///
    /// Legality is not checked here; consult the oracle first.
    #[instrument(skip(self))]
    pub fn apply_move(&mut self, from: Position, to: Position) -> Option<Piece> {
        let taken = self.remove_at(to);
        if let Some(piece) = self.pieces.iter_mut().find(|p| p.position() == from) {
            *piece = piece.moved_to(to);
        }
        taken
    }

    /// Returns true if `team` still has a king on the board.
    pub fn has_king(&self, team: Team) -> bool {
        self.pieces
            .iter()
            .any(|p| p.team() == team && p.identity() == Identity::King)
    }
}
