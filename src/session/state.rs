//! State of one game session.
//!
//! Everything here is synchronous and only ever called from the session's
//! own worker, which is what makes the mutations linearizable.

use crate::client::{ClientId, ClientRef};
use chessfor4_rules::{Board, Identity, MoveDescription, MoveVerdict, Piece, Position, Team};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, instrument};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Number of seats around the board.
pub const SEATS: usize = 4;

/// Fewest players a game may be started with early.
pub const MIN_PLAYERS: usize = 2;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Lifecycle {
    /// Accepting players, not started.
    Waiting,
    /// Moves are being played.
    Active,
    /// One team is left standing.
    Finished,
    /// Every player left.
    Abandoned,
}

/// A seated participant. The team may be reassigned on join.
#[derive(Debug, Clone, Getters, new)]
pub struct Player {
    client: ClientRef,
    nick: String,
    profile_id: String,
    team: Team,
}

/// Reason a session refused a request.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SessionRefusal {
    /// All seats are taken.
    #[display("Server is full")]
    Full,
    /// The game is running and late joins are not allowed.
    #[display("Game has already started")]
    AlreadyStarted,
    /// The game is over.
    #[display("Game is over")]
    Closed,
    /// The client already has a seat here.
    #[display("You are already in this game")]
    AlreadySeated,
    /// The start policy is not met.
    #[display("Need {} players to start, have {}", need, have)]
    NotEnoughPlayers {
        /// Required players.
        need: usize,
        /// Seated players.
        have: usize,
    },
    /// The game is not waiting for players.
    #[display("Game is not waiting for players")]
    NotWaiting,
    /// The seat number does not exist.
    #[display("Seat {} does not exist", _0)]
    NoSuchSeat(u8),
    /// Someone else sits there.
    #[display("Seat {} is taken", _0)]
    SeatTaken(Team),
    /// The client has no seat in this game.
    #[display("You are not seated in this game")]
    NotSeated,
    /// The game is not in progress.
    #[display("Game is not in progress")]
    NotActive,
    /// Another team must move first.
    #[display("It is team {}'s turn", _0)]
    NotYourTurn(Team),
    /// Nothing stands on the source square.
    #[display("No piece at {}", _0)]
    NoPieceAt(Position),
}

/// Serializable view of a seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PlayerView {
    id: String,
    nick: String,
    team: Team,
}

/// Serializable snapshot of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct SessionView {
    id: SessionId,
    title: String,
    owner: String,
    lifecycle: Lifecycle,
    turn: Option<Team>,
    winner: Option<Team>,
    players: Vec<PlayerView>,
    board: Board,
    tasks_executed: u64,
}

/// What an applied move changed beyond the moved piece.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    /// Captured piece.
    pub captured: Option<Piece>,
    /// Team knocked out by losing its king.
    pub eliminated: Option<Team>,
    /// Set when the move ended the game.
    pub finished: Option<Option<Team>>,
}

/// One game's mutable state.
#[derive(Debug, Clone, Getters)]
pub struct GameSession {
    id: SessionId,
    title: String,
    owner: ClientId,
    owner_profile: String,
    players: Vec<Player>,
    board: Board,
    can_start_before_full: bool,
    lifecycle: Lifecycle,
    turn: Option<Team>,
    winner: Option<Team>,
    eliminated: Vec<Team>,
}

impl GameSession {
    /// Creates a waiting session with `owner` seated on the first seat.
    #[instrument(skip(owner), fields(owner_nick = %owner.nick))]
    pub fn new(id: SessionId, title: String, owner: Player, can_start_before_full: bool) -> Self {
        let owner = Player {
            team: Team::South,
            ..owner
        };
        Self {
            id,
            title,
            owner: owner.client.id(),
            owner_profile: owner.profile_id.clone(),
            players: vec![owner],
            board: Board::standard(),
            can_start_before_full,
            lifecycle: Lifecycle::Waiting,
            turn: None,
            winner: None,
            eliminated: Vec::new(),
        }
    }

    /// Replaces the starting position.
    pub fn with_board(mut self, board: Board) -> Self {
        self.board = board;
        self
    }

    /// Seats available in this game.
    pub fn max_players(&self) -> usize {
        SEATS
    }

    /// Returns the seated player using `client`.
    pub fn player(&self, client: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.client.id() == client)
    }

    fn seat_taken(&self, team: Team) -> bool {
        self.players.iter().any(|p| p.team == team)
    }

    fn free_seat(&self) -> Option<Team> {
        Team::iter().find(|t| !self.seat_taken(*t) && !self.eliminated.contains(t))
    }

    /// Seats `player` on the lowest free seat.
    #[instrument(skip(self, player), fields(session_id = %self.id, nick = %player.nick))]
    pub fn join(&mut self, player: Player) -> Result<Team, SessionRefusal> {
        if self.player(player.client.id()).is_some() {
            return Err(SessionRefusal::AlreadySeated);
        }
        match self.lifecycle {
            Lifecycle::Waiting => {}
            Lifecycle::Active if self.can_start_before_full => {}
            Lifecycle::Active => return Err(SessionRefusal::AlreadyStarted),
            Lifecycle::Finished | Lifecycle::Abandoned => return Err(SessionRefusal::Closed),
        }
        if self.players.len() >= self.max_players() {
            return Err(SessionRefusal::Full);
        }
        let team = self.free_seat().ok_or(SessionRefusal::Full)?;
        self.players.push(Player { team, ..player });
        debug!(%team, seated = self.players.len(), "Player seated");
        Ok(team)
    }

    /// Removes the player using `client` and returns it.
    ///
    /// An empty session becomes abandoned; an active game that drops to a
    /// single team ends.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn remove_client(&mut self, client: ClientId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.client.id() == client)?;
        let player = self.players.remove(index);
        if self.players.is_empty() {
            self.lifecycle = Lifecycle::Abandoned;
            self.turn = None;
        } else if self.lifecycle == Lifecycle::Active {
            self.settle_after_loss(player.team);
        }
        Some(player)
    }

    /// Moves the game from waiting to active if the start policy allows it.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn start(&mut self) -> Result<Team, SessionRefusal> {
        if self.lifecycle != Lifecycle::Waiting {
            return Err(SessionRefusal::NotWaiting);
        }
        let have = self.players.len();
        let need = if self.can_start_before_full {
            MIN_PLAYERS
        } else {
            self.max_players()
        };
        if have < need {
            return Err(SessionRefusal::NotEnoughPlayers { need, have });
        }
        let first = self
            .alive_teams()
            .into_iter()
            .next()
            .ok_or(SessionRefusal::NotEnoughPlayers { need, have })?;
        self.lifecycle = Lifecycle::Active;
        self.turn = Some(first);
        Ok(first)
    }

    /// Moves the player using `client` to `seat`.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn change_seat(&mut self, client: ClientId, seat: u8) -> Result<Team, SessionRefusal> {
        if self.lifecycle != Lifecycle::Waiting {
            return Err(SessionRefusal::NotWaiting);
        }
        let team = Team::from_seat(seat).ok_or(SessionRefusal::NoSuchSeat(seat))?;
        let index = self
            .players
            .iter()
            .position(|p| p.client.id() == client)
            .ok_or(SessionRefusal::NotSeated)?;
        if self.players[index].team == team {
            return Ok(team);
        }
        if self.seat_taken(team) {
            return Err(SessionRefusal::SeatTaken(team));
        }
        self.players[index].team = team;
        Ok(team)
    }

    /// Updates the nickname shown for the player using `client`.
    ///
    /// Returns false if the client has no seat here.
    pub fn rename(&mut self, client: ClientId, nick: String) -> bool {
        match self.players.iter_mut().find(|p| p.client.id() == client) {
            Some(player) => {
                player.nick = nick;
                true
            }
            None => false,
        }
    }

    /// Checks everything about a move except piece geometry and returns the
    /// mover's team and the piece to move.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn prepare_move(
        &self,
        client: ClientId,
        description: &MoveDescription,
    ) -> Result<(Team, Piece), SessionRefusal> {
        if self.lifecycle != Lifecycle::Active {
            return Err(SessionRefusal::NotActive);
        }
        let team = self.player(client).ok_or(SessionRefusal::NotSeated)?.team;
        if let Some(turn) = self.turn
            && turn != team
        {
            return Err(SessionRefusal::NotYourTurn(turn));
        }
        let piece = self
            .board
            .piece_at(description.from)
            .copied()
            .ok_or(SessionRefusal::NoPieceAt(description.from))?;
        Ok((team, piece))
    }

    /// Applies a move the oracle allowed and advances the turn.
    #[instrument(skip(self, verdict), fields(session_id = %self.id))]
    pub fn apply_move(&mut self, description: &MoveDescription, verdict: &MoveVerdict) -> MoveOutcome {
        let mover = self.turn;
        let captured = self.board.apply_move(description.from, description.to);
        debug_assert_eq!(captured.as_ref(), verdict.taken());

        let mut outcome = MoveOutcome {
            captured,
            ..MoveOutcome::default()
        };
        if let Some(victim) = captured
            && victim.identity() == Identity::King
        {
            let team = victim.team();
            self.board.remove_team(team);
            if !self.eliminated.contains(&team) {
                self.eliminated.push(team);
            }
            outcome.eliminated = Some(team);
        }

        if let Some(current) = mover {
            self.turn = self.next_turn(current);
        }
        if self.alive_teams().len() <= 1 {
            self.finish();
            outcome.finished = Some(self.winner);
        }
        outcome
    }

    /// Seated teams that still have a king in play, in seat order.
    fn alive_teams(&self) -> Vec<Team> {
        Team::iter()
            .filter(|t| self.seat_taken(*t) && !self.eliminated.contains(t))
            .collect()
    }

    fn next_turn(&self, current: Team) -> Option<Team> {
        let alive = self.alive_teams();
        alive
            .iter()
            .copied()
            .find(|t| *t > current)
            .or_else(|| alive.first().copied())
    }

    fn settle_after_loss(&mut self, departed: Team) {
        if self.alive_teams().len() <= 1 {
            self.finish();
        } else if self.turn == Some(departed) {
            self.turn = self.next_turn(departed);
        }
    }

    fn finish(&mut self) {
        self.winner = self.alive_teams().first().copied();
        self.lifecycle = Lifecycle::Finished;
        self.turn = None;
    }

    /// Builds the serializable snapshot.
    pub fn view(&self, tasks_executed: u64) -> SessionView {
        SessionView {
            id: self.id.clone(),
            title: self.title.clone(),
            owner: self.owner_profile.clone(),
            lifecycle: self.lifecycle,
            turn: self.turn,
            winner: self.winner,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.profile_id.clone(),
                    nick: p.nick.clone(),
                    team: p.team,
                })
                .collect(),
            board: self.board.clone(),
            tasks_executed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chessfor4_rules::{MoveOracle, StandardRules};

    fn player(nick: &str) -> Player {
        let (client, _rx) = ClientRef::new(8);
        Player::new(client, nick.to_string(), format!("{}-id", nick), Team::South)
    }

    fn session(can_start_before_full: bool) -> (GameSession, Player) {
        let owner = player("owner");
        let session = GameSession::new(
            "s1".to_string(),
            "owner's game".to_string(),
            owner.clone(),
            can_start_before_full,
        );
        (session, owner)
    }

    fn full_session() -> (GameSession, Vec<Player>) {
        let (mut session, owner) = session(false);
        let mut players = vec![owner];
        for nick in ["b", "c", "d"] {
            let p = player(nick);
            session.join(p.clone()).expect("seat free");
            players.push(p);
        }
        (session, players)
    }

    fn play(session: &mut GameSession, who: &Player, from: (i32, i32), to: (i32, i32)) -> MoveOutcome {
        let description = MoveDescription::new(Position::new(from.0, from.1), Position::new(to.0, to.1));
        let (team, piece) = session
            .prepare_move(who.client().id(), &description)
            .expect("prepared");
        let verdict = StandardRules.check(team, &piece, session.board(), &description);
        assert!(verdict.allowed(), "{}", verdict.message());
        session.apply_move(&description, &verdict)
    }

    #[test]
    fn test_join_assigns_lowest_free_seat() {
        let (mut session, _owner) = session(false);
        assert_eq!(session.join(player("b")), Ok(Team::West));
        assert_eq!(session.join(player("c")), Ok(Team::North));
    }

    #[test]
    fn test_join_full_leaves_state_unchanged() {
        let (mut session, _players) = full_session();
        let before = session.players().len();

        assert_eq!(session.join(player("e")), Err(SessionRefusal::Full));
        assert_eq!(session.players().len(), before);
    }

    #[test]
    fn test_join_after_start_depends_on_policy() {
        let (mut strict, players) = full_session();
        strict.start().expect("full game starts");
        strict.remove_client(players[3].client().id());
        assert_eq!(strict.join(player("late")), Err(SessionRefusal::AlreadyStarted));

        let (mut relaxed, _owner) = session(true);
        relaxed.join(player("b")).expect("seat");
        relaxed.start().expect("early start allowed");
        assert_eq!(relaxed.join(player("late")), Ok(Team::North));
    }

    #[test]
    fn test_start_policy() {
        let (mut strict, _owner) = session(false);
        strict.join(player("b")).expect("seat");
        assert_eq!(
            strict.start(),
            Err(SessionRefusal::NotEnoughPlayers { need: 4, have: 2 })
        );
        assert_eq!(*strict.lifecycle(), Lifecycle::Waiting);

        let (mut alone, _owner) = session(true);
        assert!(alone.start().is_err());

        let (mut full, _players) = full_session();
        assert_eq!(full.start(), Ok(Team::South));
        assert_eq!(*full.lifecycle(), Lifecycle::Active);
        assert_eq!(full.start(), Err(SessionRefusal::NotWaiting));
    }

    #[test]
    fn test_change_seat() {
        let (mut session, owner) = session(false);
        let b = player("b");
        session.join(b.clone()).expect("seat");

        assert_eq!(session.change_seat(owner.client().id(), 3), Ok(Team::North));
        assert_eq!(
            session.change_seat(owner.client().id(), 2),
            Err(SessionRefusal::SeatTaken(Team::West))
        );
        assert_eq!(
            session.change_seat(owner.client().id(), 9),
            Err(SessionRefusal::NoSuchSeat(9))
        );
        let (stranger, _rx) = ClientRef::new(1);
        assert_eq!(session.change_seat(stranger.id(), 4), Err(SessionRefusal::NotSeated));
    }

    #[test]
    fn test_rename_updates_view() {
        let (mut session, owner) = session(false);

        assert!(session.rename(owner.client().id(), "Renamed".to_string()));
        assert!(!session.rename(player("x").client().id(), "Nobody".to_string()));

        let view = session.view(0);
        assert_eq!(view.players()[0].nick(), "Renamed");
    }

    #[test]
    fn test_turn_order_rotates() {
        let (mut session, players) = full_session();
        session.start().expect("start");

        play(&mut session, &players[0], (5, 12), (5, 10));
        assert_eq!(*session.turn(), Some(Team::West));
        play(&mut session, &players[1], (1, 5), (3, 5));
        assert_eq!(*session.turn(), Some(Team::North));

        let description = MoveDescription::new(Position::new(5, 10), Position::new(5, 9));
        assert_eq!(
            session.prepare_move(players[0].client().id(), &description),
            Err(SessionRefusal::NotYourTurn(Team::North))
        );
    }

    #[test]
    fn test_move_before_start_refused() {
        let (session, owner) = session(false);
        let description = MoveDescription::new(Position::new(5, 12), Position::new(5, 10));
        assert_eq!(
            session.prepare_move(owner.client().id(), &description),
            Err(SessionRefusal::NotActive)
        );
    }

    #[test]
    fn test_leaving_rotates_turn_and_finishes() {
        let (mut session, owner) = session(true);
        let b = player("b");
        session.join(b.clone()).expect("seat");
        session.start().expect("start");
        assert_eq!(*session.turn(), Some(Team::South));

        session.remove_client(owner.client().id());

        assert_eq!(*session.lifecycle(), Lifecycle::Finished);
        assert_eq!(*session.winner(), Some(Team::West));

        session.remove_client(b.client().id());
        assert_eq!(*session.lifecycle(), Lifecycle::Abandoned);
    }

    #[test]
    fn test_king_capture_eliminates_and_finishes() {
        let (mut session, owner) = session(true);
        let b = player("b");
        session.join(b.clone()).expect("seat");
        let mut board = Board::empty();
        board.place(Piece::new(Identity::Rook, Position::new(3, 7), Team::South));
        board.place(Piece::new(Identity::King, Position::new(7, 13), Team::South));
        board.place(Piece::new(Identity::King, Position::new(0, 7), Team::West));
        let mut session = session.with_board(board);
        session.start().expect("start");

        let outcome = play(&mut session, &owner, (3, 7), (0, 7));

        assert_eq!(outcome.eliminated, Some(Team::West));
        assert_eq!(outcome.finished, Some(Some(Team::South)));
        assert_eq!(*session.lifecycle(), Lifecycle::Finished);
        assert!(!session.board().has_king(Team::West));
    }
}
