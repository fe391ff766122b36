//! Server-wide state: the lobby of profiles and the directory of sessions.
//!
//! A [`Server`] is owned by exactly one dispatch worker (see [`Dispatcher`]),
//! which is the only caller of its `&mut self` operations. Session state is
//! never read here; sessions are driven through their handles and report
//! membership and lifecycle changes back as [`SessionOutcome`]s. The server
//! never waits for a session to answer.

mod directory;
mod dispatch;
mod handler;

pub use directory::{DirectoryEntry, SessionDirectory};
pub use dispatch::{CommandHandler, DispatchItem, Dispatcher, Inbound, ServerHandle};
pub use handler::JsonCommandHandler;

use crate::client::{ClientId, ClientRef, deliver};
use crate::config::ServerConfig;
use crate::events::{CoreEvent, EventSink, Operation};
use crate::messages::{ListOfGames, ServerMessage, View};
use crate::profile::{DEFAULT_NICK, Lobby, Profile};
use crate::session::{
    GameSession, Player, SessionActor, SessionHandle, SessionId, SessionOutcome, SessionSettings,
    SessionTask,
};
use chessfor4_rules::{MoveDescription, MoveOracle, StandardRules, Team};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const JOIN_TITLE: &str = "Could not join game";

/// Lobby, session directory and the collaborators sessions are built with.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    lobby: Lobby,
    directory: SessionDirectory,
    oracle: Arc<dyn MoveOracle>,
    events: Arc<dyn EventSink>,
    outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<SessionOutcome>,
}

impl Server {
    /// Creates a server that validates moves with [`StandardRules`].
    #[instrument(skip(events))]
    pub fn new(config: ServerConfig, events: Arc<dyn EventSink>) -> Self {
        Self::with_oracle(config, Arc::new(StandardRules), events)
    }

    /// Creates a server with a custom move oracle.
    #[instrument(skip(oracle, events))]
    pub fn with_oracle(
        config: ServerConfig,
        oracle: Arc<dyn MoveOracle>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        debug!("Creating server");
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            config,
            lobby: Lobby::new(),
            directory: SessionDirectory::new(),
            oracle,
            events,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connected profiles.
    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    /// Registered sessions.
    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Event sink shared with every session.
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Returns the profile for `client`, creating it on first contact.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub fn get_or_create_profile(&mut self, client: &ClientRef) -> &Profile {
        let (profile, created) = self.lobby.get_or_create(client);
        if created {
            self.events.emit(CoreEvent::ProfileCreated {
                client: client.id(),
            });
        }
        profile
    }

    fn player_for(&mut self, client: &ClientRef) -> Player {
        let profile = self.get_or_create_profile(client);
        Player::new(
            client.clone(),
            profile.nick().clone(),
            profile.id().clone(),
            Team::South,
        )
    }

    /// Refuses with `title` if `client` plays, or is about to play, in a
    /// game that is not over.
    async fn refuse_if_seated(&mut self, client: &ClientRef, title: &str) -> bool {
        self.release_if_over(client).await;
        let Some(entry) = self.directory.by_member_or_pending(client.id()) else {
            return false;
        };
        self.events.emit(CoreEvent::AlreadySeated {
            client: client.id(),
            session: entry.handle().id().clone(),
        });
        self.reply(client, &ServerMessage::error(title, "You are already in a game"));
        true
    }

    /// Takes `client` out of a game that has ended so it counts as idle.
    async fn release_if_over(&mut self, client: &ClientRef) {
        let Some(handle) = self
            .directory
            .by_member(client.id())
            .filter(|e| e.is_over())
            .map(|e| e.handle().clone())
        else {
            return;
        };
        debug!(session_id = %handle.id(), "Releasing player from finished game");
        self.directory.record_leave(handle.id(), client.id());
        let task = SessionTask::Leave {
            client: client.id(),
            reply: None,
        };
        self.submit(&handle, task).await;
    }

    /// Creates a session owned by `client` and seats it on the first seat.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn create_game(&mut self, client: &ClientRef) -> Option<SessionId> {
        if self.refuse_if_seated(client, "Could not create game").await {
            return None;
        }
        let owner = self.player_for(client);
        let id = Uuid::new_v4().to_string();
        let title = if owner.nick().is_empty() {
            format!("Game {}", &id[..8])
        } else {
            format!("{}'s game", owner.nick())
        };

        let state = GameSession::new(
            id.clone(),
            title.clone(),
            owner,
            *self.config.can_start_before_full(),
        );
        let handle = SessionActor::spawn(
            state,
            SessionSettings::from(&self.config),
            Arc::clone(&self.oracle),
            Arc::clone(&self.events),
            self.outcome_tx.clone(),
        );
        self.directory.insert(handle.clone(), title.clone(), client.id());
        self.events.emit(CoreEvent::SessionCreated {
            session: id.clone(),
            title,
        });

        self.show_board(&handle).await;
        Some(id)
    }

    /// Asks session `id` to seat `client`.
    ///
    /// Returns true if the request reached the session. The seat or the
    /// refusal arrives later as a [`SessionOutcome::Joined`].
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn join_game(&mut self, id: &str, client: &ClientRef) -> bool {
        if self.refuse_if_seated(client, JOIN_TITLE).await {
            return false;
        }
        let Some(handle) = self.directory.get(id).map(|e| e.handle().clone()) else {
            self.events.emit(CoreEvent::NotFound {
                operation: Operation::JoinGame,
                client: client.id(),
            });
            self.reply(client, &ServerMessage::error(JOIN_TITLE, "Game not found"));
            return false;
        };

        let player = self.player_for(client);
        self.directory.record_pending(client.id(), id.to_string());
        let task = SessionTask::Join {
            player,
            reply: None,
        };
        if let Err(e) = handle.do_work(task).await {
            warn!(session_id = %id, error = %e, "Session refused join");
            self.directory.clear_pending(client.id(), id);
            self.reply(client, &ServerMessage::error(JOIN_TITLE, "Game is closing"));
            return false;
        }
        true
    }

    /// Asks the session owned by `client` to start.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn start_game(&mut self, client: &ClientRef) {
        let Some(handle) = self.game_by_client_owner(client.id()).cloned() else {
            self.not_found(Operation::StartGame, client);
            return;
        };
        self.submit(&handle, SessionTask::Start).await;
    }

    /// Forwards a move to the session `client` plays in.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn move_piece(&mut self, client: &ClientRef, description: MoveDescription) {
        let Some(handle) = self.game_by_client_playing(client.id()).cloned() else {
            self.not_found(Operation::Move, client);
            return;
        };
        let task = SessionTask::Move {
            client: client.clone(),
            description,
        };
        self.submit(&handle, task).await;
    }

    /// Forwards a seat change. Without a session this only emits an event.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn change_seat(&mut self, client: &ClientRef, seat: u8) {
        let Some(handle) = self.game_by_client_playing(client.id()).cloned() else {
            self.not_found(Operation::ChangeSeat, client);
            return;
        };
        let task = SessionTask::ChangeSeat {
            client: client.clone(),
            seat,
        };
        self.submit(&handle, task).await;
    }

    /// Assigns a lobby-unique nickname and sends the client its credentials.
    /// A seated client's game is told about the new name.
    ///
    /// Returns the nickname actually assigned.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn set_nick(&mut self, client: &ClientRef, nick: &str) -> String {
        self.get_or_create_profile(client);
        let trimmed = nick.trim();
        let requested = if trimmed.is_empty() {
            DEFAULT_NICK
        } else {
            trimmed
        };
        let unique = self.lobby.unique_nick(requested, client.id());

        let Some(profile) = self.lobby.set_nick(client.id(), unique.clone()) else {
            return unique;
        };
        let ack = ServerMessage::Secret {
            secret: profile.secret().clone(),
            id: profile.id().clone(),
        };
        self.events.emit(CoreEvent::NickAssigned {
            client: client.id(),
            nick: unique.clone(),
        });
        self.reply(client, &ack);

        let seated = self
            .directory
            .by_member_or_pending(client.id())
            .map(|e| e.handle().clone());
        if let Some(handle) = seated {
            let task = SessionTask::Rename {
                client: client.id(),
                nick: unique.clone(),
            };
            self.submit(&handle, task).await;
        }
        unique
    }

    /// Removes `client` from the lobby and asks its session to drop it.
    ///
    /// The session's [`SessionOutcome::Left`] later decides whether the game
    /// is unregistered or its remaining players receive the new state.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub async fn disconnect(&mut self, client: &ClientRef) {
        let seated = self
            .directory
            .by_member_or_pending(client.id())
            .map(|e| e.handle().clone());

        if let Some(handle) = seated {
            self.directory.clear_pending(client.id(), handle.id());
            let task = SessionTask::Leave {
                client: client.id(),
                reply: None,
            };
            self.submit(&handle, task).await;
        }

        if self.lobby.remove(client.id()).is_some() {
            self.events.emit(CoreEvent::ProfileRemoved {
                client: client.id(),
            });
        }
    }

    /// Snapshot of every hosted game in creation order.
    pub fn list_of_games(&self) -> ListOfGames {
        self.directory.listing()
    }

    /// Sends the game listing to `client`.
    pub fn send_list(&self, client: &ClientRef) {
        self.reply(client, &ServerMessage::from(self.list_of_games()));
    }

    /// Broadcasts the game listing to every profile not seated in a game
    /// that is still being played.
    #[instrument(skip(self))]
    pub fn notify_lobby(&self) {
        let Some(bytes) = self.encode(&ServerMessage::from(self.list_of_games())) else {
            return;
        };
        let idle = self.lobby.profiles().filter(|p| {
            self.directory
                .by_member_or_pending(p.client().id())
                .is_none_or(|e| e.is_over())
        });
        for profile in idle {
            deliver(self.events.as_ref(), profile.client(), bytes.clone());
        }
    }

    /// Session created by `client`.
    pub fn game_by_client_owner(&self, client: ClientId) -> Option<&SessionHandle> {
        self.directory.by_owner(client).map(|e| e.handle())
    }

    /// Session `client` is seated in, or has asked to join.
    pub fn game_by_client_playing(&self, client: ClientId) -> Option<&SessionHandle> {
        self.directory.by_member_or_pending(client).map(|e| e.handle())
    }

    /// Applies one outcome a session reported.
    #[instrument(skip(self, outcome), fields(session_id = %outcome.session()))]
    pub async fn apply_outcome(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Joined {
                session,
                client,
                result,
            } => {
                self.directory.clear_pending(client.id(), &session);
                let Some(handle) = self.directory.get(&session).map(|e| e.handle().clone()) else {
                    debug!("Join answered by an unregistered session");
                    return;
                };
                match result {
                    Ok(_team) => {
                        self.directory.record_join(&session, client.id());
                        self.show_board(&handle).await;
                        self.notify_lobby();
                    }
                    Err(refusal) => {
                        self.reply(&client, &ServerMessage::error(JOIN_TITLE, refusal.to_string()))
                    }
                }
            }
            SessionOutcome::Left {
                session,
                client,
                remaining,
            } => {
                self.directory.record_leave(&session, client);
                let Some(handle) = self.directory.get(&session).map(|e| e.handle().clone()) else {
                    return;
                };
                if remaining == 0 {
                    self.remove_session(&handle);
                } else {
                    self.submit(&handle, SessionTask::ShareState).await;
                }
                self.notify_lobby();
            }
            SessionOutcome::LifecycleChanged { session, lifecycle } => {
                self.directory.record_lifecycle(&session, lifecycle);
            }
        }
    }

    /// Applies every outcome already reported, without waiting.
    pub async fn apply_ready_outcomes(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply_outcome(outcome).await;
            applied += 1;
        }
        applied
    }

    /// Waits for the next reported outcome.
    pub(crate) async fn next_outcome(&mut self) -> Option<SessionOutcome> {
        self.outcome_rx.recv().await
    }

    /// Waits until every session has run the tasks queued so far, then
    /// applies what they reported. Repeats while outcomes keep arriving.
    ///
    /// The dispatch worker applies outcomes as they come; this is for
    /// callers driving a [`Server`] directly.
    #[instrument(skip(self))]
    pub async fn settle(&mut self) {
        loop {
            for handle in self.directory.handles() {
                if let Err(e) = handle.snapshot().await {
                    debug!(session_id = %handle.id(), error = %e, "Session gone while settling");
                }
            }
            if self.apply_ready_outcomes().await == 0 {
                break;
            }
        }
    }

    /// Stops and unregisters a session. Clients still waiting to join it
    /// are told it is closing.
    fn remove_session(&mut self, handle: &SessionHandle) {
        handle.stop();
        let id = handle.id().clone();
        for client in self.directory.pending_on(&id) {
            if let Some(profile) = self.lobby.get(client) {
                self.reply(
                    profile.client(),
                    &ServerMessage::error(JOIN_TITLE, "Game is closing"),
                );
            }
        }
        self.directory.remove(&id);
        self.events.emit(CoreEvent::SessionRemoved { session: id });
    }

    /// Stops and unregisters every session.
    #[instrument(skip(self))]
    pub fn stop_all_sessions(&mut self) {
        for handle in self.directory.drain() {
            handle.stop();
            self.events.emit(CoreEvent::SessionRemoved {
                session: handle.id().clone(),
            });
        }
    }

    /// Sends `message` to `client` alone.
    pub fn reply(&self, client: &ClientRef, message: &ServerMessage) {
        if let Some(bytes) = self.encode(message) {
            deliver(self.events.as_ref(), client, bytes);
        }
    }

    fn encode(&self, message: &ServerMessage) -> Option<Vec<u8>> {
        match message.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Could not encode message");
                None
            }
        }
    }

    fn not_found(&self, operation: Operation, client: &ClientRef) {
        self.events.emit(CoreEvent::NotFound {
            operation,
            client: client.id(),
        });
    }

    async fn submit(&self, handle: &SessionHandle, task: SessionTask) {
        if let Err(e) = handle.do_work(task).await {
            warn!(session_id = %handle.id(), error = %e, "Session refused task");
        }
    }

    async fn show_board(&self, handle: &SessionHandle) {
        if let Some(bytes) = self.encode(&ServerMessage::View { view: View::Board }) {
            self.submit(handle, SessionTask::Announce(bytes)).await;
        }
        self.submit(handle, SessionTask::ShareState).await;
    }
}
