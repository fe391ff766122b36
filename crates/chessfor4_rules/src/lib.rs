//! Four-player chess rules.
//!
//! Pure board storage and move legality for chess on the 14x14 cross-shaped
//! board. Nothing in this crate holds locks or spawns tasks; the server
//! consults it from inside a game session's worker.
//!
//! # Example
//!
//! ```
//! use chessfor4_rules::{Board, MoveDescription, Position, Team, is_move_possible};
//!
//! let board = Board::standard();
//! let from = Position::new(5, 12);
//! let pawn = board.piece_at(from).copied().expect("south pawn");
//! let verdict = is_move_possible(
//!     Team::South,
//!     &pawn,
//!     &board,
//!     &MoveDescription::new(from, Position::new(5, 10)),
//! );
//! assert!(verdict.allowed());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod board;
mod oracle;
pub mod rules;
mod types;

pub use action::{MoveDescription, MoveError, MoveVerdict};
pub use board::Board;
pub use oracle::{MoveOracle, StandardRules};
pub use rules::is_move_possible;
pub use types::{BOARD_SIZE, CORNER_SIZE, Identity, Piece, Position, Team};
