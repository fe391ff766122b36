//! Core domain types for four-player chess.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Side length of the board, corners included.
pub const BOARD_SIZE: i32 = 14;

/// Side length of each removed corner block.
pub const CORNER_SIZE: i32 = 3;

/// One of the four seats around the board.
///
/// Serialized as its seat number (1-4) so clients can send plain integers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Team {
    /// Seat 1, starts on the bottom edge and advances toward y = 0.
    #[display("1")]
    South = 1,
    /// Seat 2, starts on the left edge and advances toward x = 13.
    #[display("2")]
    West = 2,
    /// Seat 3, starts on the top edge and advances toward y = 13.
    #[display("3")]
    North = 3,
    /// Seat 4, starts on the right edge and advances toward x = 0.
    #[display("4")]
    East = 4,
}

impl Team {
    /// Converts a seat number into a team.
    #[instrument]
    pub fn from_seat(seat: u8) -> Option<Self> {
        match seat {
            1 => Some(Self::South),
            2 => Some(Self::West),
            3 => Some(Self::North),
            4 => Some(Self::East),
            _ => None,
        }
    }

    /// Returns the seat number of this team.
    pub fn seat(self) -> u8 {
        self as u8
    }

    /// Unit step a pawn of this team takes when advancing.
    #[instrument]
    pub fn forward(self) -> (i32, i32) {
        match self {
            Self::South => (0, -1),
            Self::West => (1, 0),
            Self::North => (0, 1),
            Self::East => (-1, 0),
        }
    }

    /// Rank (row or column, depending on orientation) pawns start on.
    #[instrument]
    pub fn pawn_rank(self) -> i32 {
        match self {
            Self::South => BOARD_SIZE - 2,
            Self::West => 1,
            Self::North => 1,
            Self::East => BOARD_SIZE - 2,
        }
    }

    /// Returns the coordinate along this team's forward axis.
    pub fn rank_of(self, position: Position) -> i32 {
        match self {
            Self::South | Self::North => position.y,
            Self::West | Self::East => position.x,
        }
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(seat: u8) -> Result<Self, Self::Error> {
        Self::from_seat(seat).ok_or_else(|| format!("seat {} is not between 1 and 4", seat))
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> Self {
        team.seat()
    }
}

/// Kind of piece.
///
/// Wire values outside the known set decode as [`Identity::Unknown`], which
/// the oracle always rejects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Identity {
    /// Pawn.
    Pawn,
    /// Knight.
    Knight,
    /// Bishop.
    Bishop,
    /// Rook.
    Rook,
    /// Queen.
    Queen,
    /// King.
    King,
    /// Anything else a client or a corrupted board might carry.
    #[serde(other)]
    Unknown,
}

/// A square on the board, addressed by column `x` and row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column, 0 on the left.
    pub x: i32,
    /// Row, 0 on the top.
    pub y: i32,
}

impl Position {
    /// Creates a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns true if the square exists on the cross-shaped board.
    #[instrument]
    pub fn is_on_board(self) -> bool {
        let in_range = |v: i32| (0..BOARD_SIZE).contains(&v);
        if !in_range(self.x) || !in_range(self.y) {
            return false;
        }
        let edge = |v: i32| v < CORNER_SIZE || v >= BOARD_SIZE - CORNER_SIZE;
        !(edge(self.x) && edge(self.y))
    }

    /// Returns this position shifted by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A piece standing on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    identity: Identity,
    position: Position,
    team: Team,
}

impl Piece {
    /// Creates a piece.
    pub fn new(identity: Identity, position: Position, team: Team) -> Self {
        Self {
            identity,
            position,
            team,
        }
    }

    /// Returns the kind of piece.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Returns the square the piece stands on.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Returns the owning team.
    pub fn team(&self) -> Team {
        self.team
    }

    /// Returns a copy of this piece standing on `position`.
    pub fn moved_to(self, position: Position) -> Self {
        Self { position, ..self }
    }
}
