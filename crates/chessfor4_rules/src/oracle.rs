//! The move legality oracle seen from the outside.

use crate::action::{MoveDescription, MoveVerdict};
use crate::board::Board;
use crate::rules::is_move_possible;
use crate::types::{Piece, Team};

/// Answers whether a move is legal without touching any state.
///
/// Game sessions hold an oracle behind an `Arc` and may evaluate it on a
/// blocking thread, so implementations must be `Send + Sync`.
pub trait MoveOracle: Send + Sync + std::fmt::Debug {
    /// Evaluates one move attempt.
    fn check(
        &self,
        team: Team,
        piece: &Piece,
        board: &Board,
        description: &MoveDescription,
    ) -> MoveVerdict;
}

/// The standard four-player chess rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl MoveOracle for StandardRules {
    fn check(
        &self,
        team: Team,
        piece: &Piece,
        board: &Board,
        description: &MoveDescription,
    ) -> MoveVerdict {
        is_move_possible(team, piece, board, description)
    }
}
