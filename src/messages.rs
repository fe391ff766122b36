//! JSON message envelopes exchanged with clients.
//!
//! Every envelope carries a `"msg"` tag naming its kind.

use crate::error::ServerError;
use crate::session::SessionView;
use chessfor4_rules::MoveDescription;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Screen a client should switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// The game board.
    Board,
    /// The list of games.
    Lobby,
}

/// One row of the game listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GameListing {
    id: String,
    title: String,
    /// Formatted as `"<seated>/<capacity>"`.
    players: String,
}

impl GameListing {
    /// Creates a listing row.
    pub fn new(id: String, title: String, seated: usize, capacity: usize) -> Self {
        Self {
            id,
            title,
            players: format!("{}/{}", seated, capacity),
        }
    }
}

/// Lightweight description of every hosted game.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct ListOfGames {
    games: Vec<GameListing>,
}

impl ListOfGames {
    /// Wraps listing rows.
    pub fn new(games: Vec<GameListing>) -> Self {
        Self { games }
    }

    /// Finds the row for `id`.
    pub fn find(&self, id: &str) -> Option<&GameListing> {
        self.games.iter().find(|g| g.id == id)
    }
}

/// Message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Switch to another screen.
    View {
        /// Target screen.
        view: View,
    },
    /// Something the client asked for did not happen.
    Error {
        /// Short headline.
        title: String,
        /// Explanation.
        detail: String,
    },
    /// Acknowledges a nickname with the profile's credentials.
    Secret {
        /// Secret token.
        secret: String,
        /// Profile id.
        id: String,
    },
    /// Current list of games.
    Games {
        /// Listing rows.
        games: Vec<GameListing>,
    },
    /// Full state of the client's game.
    State {
        /// Session snapshot.
        game: SessionView,
    },
}

impl ServerMessage {
    /// Builds an error envelope.
    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Error {
            title: title.into(),
            detail: detail.into(),
        }
    }

    /// Serializes the envelope to JSON bytes.
    #[instrument(skip(self))]
    pub fn encode(&self) -> Result<Vec<u8>, ServerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl From<ListOfGames> for ServerMessage {
    fn from(list: ListOfGames) -> Self {
        Self::Games { games: list.games }
    }
}

/// Command sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Choose a nickname.
    Nick {
        /// Requested nickname.
        nick: String,
    },
    /// Create a new game owned by the sender.
    Create,
    /// Join an existing game.
    Join {
        /// Session id.
        id: String,
    },
    /// Start the game the sender owns.
    Start,
    /// Move a piece.
    Move(MoveDescription),
    /// Take another seat.
    Seat {
        /// Seat number, 1-4.
        seat: u8,
    },
    /// Ask for the game listing.
    List,
}

impl ClientCommand {
    /// Decodes a command from raw JSON bytes.
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
