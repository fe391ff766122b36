//! The worker that owns a [`GameSession`] and the handle used to reach it.
//!
//! Each session runs on its own tokio task and drains a bounded queue of
//! [`SessionTask`]s one at a time. Callers never touch the state; they
//! submit tasks through a cloneable [`SessionHandle`]. Membership and
//! lifecycle changes are posted to the server as [`SessionOutcome`]s; a
//! caller outside the server may also await a oneshot reply.

use super::state::{GameSession, Lifecycle, Player, SessionId, SessionRefusal, SessionView};
use super::task::{SessionOutcome, SessionTask};
use crate::client::{ClientId, ClientRef, deliver};
use crate::config::ServerConfig;
use crate::error::{SessionError, SessionErrorKind};
use crate::events::{CoreEvent, EventSink};
use crate::messages::{ServerMessage, View};
use chessfor4_rules::{MoveDescription, MoveOracle, Team};
use derive_getters::Getters;
use derive_new::new;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Per-session runtime limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct SessionSettings {
    /// Bound of the task queue.
    queue_capacity: usize,
    /// Deadline for rule evaluation and slow-task reporting.
    task_timeout: Duration,
}

impl From<&ServerConfig> for SessionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self::new(*config.session_queue_capacity(), config.task_timeout())
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tasks: mpsc::Sender<SessionTask>,
    stop: CancellationToken,
}

impl SessionHandle {
    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Queues `task`, waiting for room if the queue is full.
    ///
    /// Fails with [`SessionErrorKind::Stopped`] once the session has been
    /// stopped; the task is then never executed.
    #[instrument(skip(self, task), fields(session_id = %self.id, task = %task.kind()))]
    pub async fn do_work(&self, task: SessionTask) -> Result<(), SessionError> {
        if self.stop.is_cancelled() {
            return Err(SessionError::new(
                SessionErrorKind::Stopped,
                format!("Session {} is stopped", self.id),
            ));
        }
        self.tasks.send(task).await.map_err(|e| {
            SessionError::new(
                SessionErrorKind::Stopped,
                format!("Session {} no longer accepts {} tasks", self.id, e.0.kind()),
            )
        })
    }

    /// Cancels the worker. Tasks still queued are discarded.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn stop(&self) {
        debug!("Stopping session");
        self.stop.cancel();
    }

    /// Returns true once [`SessionHandle::stop`] was called.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Asks the session to seat `player`.
    #[instrument(skip(self, player), fields(session_id = %self.id))]
    pub async fn join(&self, player: Player) -> Result<Result<Team, SessionRefusal>, SessionError> {
        let (reply, answer) = oneshot::channel();
        let reply = Some(reply);
        self.do_work(SessionTask::Join { player, reply }).await?;
        self.await_reply(answer).await
    }

    /// Removes `client` and returns how many players remain.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn leave(&self, client: ClientId) -> Result<usize, SessionError> {
        let (reply, answer) = oneshot::channel();
        let reply = Some(reply);
        self.do_work(SessionTask::Leave { client, reply }).await?;
        self.await_reply(answer).await
    }

    /// Returns a snapshot taken between two tasks.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn snapshot(&self) -> Result<SessionView, SessionError> {
        let (reply, answer) = oneshot::channel();
        self.do_work(SessionTask::Snapshot { reply }).await?;
        self.await_reply(answer).await
    }

    async fn await_reply<T>(&self, answer: oneshot::Receiver<T>) -> Result<T, SessionError> {
        answer.await.map_err(|_| {
            SessionError::new(
                SessionErrorKind::ReplyDropped,
                format!("Session {} dropped the task before answering", self.id),
            )
        })
    }
}

/// Owns one session's state and executes its tasks.
#[derive(Debug)]
pub struct SessionActor {
    state: GameSession,
    inbox: mpsc::Receiver<SessionTask>,
    stop: CancellationToken,
    oracle: Arc<dyn MoveOracle>,
    events: Arc<dyn EventSink>,
    outcomes: mpsc::UnboundedSender<SessionOutcome>,
    task_timeout: Duration,
    executed: u64,
}

impl SessionActor {
    /// Starts a worker for `state` and returns its handle.
    ///
    /// Outcomes are posted to `outcomes`; nobody has to read them.
    #[instrument(skip_all, fields(session_id = %state.id()))]
    pub fn spawn(
        state: GameSession,
        settings: SessionSettings,
        oracle: Arc<dyn MoveOracle>,
        events: Arc<dyn EventSink>,
        outcomes: mpsc::UnboundedSender<SessionOutcome>,
    ) -> SessionHandle {
        let (tasks, inbox) = mpsc::channel((*settings.queue_capacity()).max(1));
        let stop = CancellationToken::new();
        let handle = SessionHandle {
            id: state.id().clone(),
            tasks,
            stop: stop.clone(),
        };
        let actor = Self {
            state,
            inbox,
            stop,
            oracle,
            events,
            outcomes,
            task_timeout: *settings.task_timeout(),
            executed: 0,
        };
        tokio::spawn(actor.run());
        handle
    }

    #[instrument(skip(self), fields(session_id = %self.state.id()))]
    async fn run(mut self) {
        debug!("Session worker started");
        let stop = self.stop.clone();
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                task = self.inbox.recv() => match task {
                    Some(task) => self.execute(task).await,
                    None => break,
                },
            }
        }

        self.inbox.close();
        while let Ok(task) = self.inbox.try_recv() {
            self.events.emit(CoreEvent::TaskDiscarded {
                session: self.state.id().clone(),
                task: task.kind(),
            });
        }
        debug!(executed = self.executed, "Session worker stopped");
    }

    async fn execute(&mut self, task: SessionTask) {
        let kind = task.kind();
        let started = Instant::now();
        let lifecycle = *self.state.lifecycle();

        match task {
            SessionTask::Announce(bytes) => self.broadcast(&bytes),
            SessionTask::ShareState => self.share_state(),
            SessionTask::Join { player, reply } => {
                let client = player.client().clone();
                let result = self.state.join(player);
                match &result {
                    Ok(team) => self.emit(CoreEvent::PlayerJoined {
                        session: self.state.id().clone(),
                        client: client.id(),
                        team: *team,
                    }),
                    Err(refusal) => self.emit(CoreEvent::JoinRejected {
                        session: self.state.id().clone(),
                        client: client.id(),
                        reason: refusal.to_string(),
                    }),
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result.clone());
                }
                self.post(SessionOutcome::Joined {
                    session: self.state.id().clone(),
                    client,
                    result,
                });
            }
            SessionTask::Leave { client, reply } => {
                let before = *self.state.lifecycle();
                if self.state.remove_client(client).is_some() {
                    self.emit(CoreEvent::PlayerLeft {
                        session: self.state.id().clone(),
                        client,
                        remaining: self.state.players().len(),
                    });
                    if before == Lifecycle::Active && *self.state.lifecycle() == Lifecycle::Finished {
                        self.emit(CoreEvent::GameFinished {
                            session: self.state.id().clone(),
                            winner: *self.state.winner(),
                        });
                    }
                }
                let remaining = self.state.players().len();
                if let Some(reply) = reply {
                    let _ = reply.send(remaining);
                }
                self.post(SessionOutcome::Left {
                    session: self.state.id().clone(),
                    client,
                    remaining,
                });
            }
            SessionTask::Start => match self.state.start() {
                Ok(first) => {
                    self.emit(CoreEvent::GameStarted {
                        session: self.state.id().clone(),
                        first,
                    });
                    self.announce(&ServerMessage::View { view: View::Board });
                    self.share_state();
                }
                Err(refusal) => self.emit(CoreEvent::StartRefused {
                    session: self.state.id().clone(),
                    reason: refusal.to_string(),
                }),
            },
            SessionTask::Move {
                client,
                description,
            } => self.play(&client, description).await,
            SessionTask::ChangeSeat { client, seat } => {
                match self.state.change_seat(client.id(), seat) {
                    Ok(team) => {
                        self.emit(CoreEvent::SeatChanged {
                            session: self.state.id().clone(),
                            client: client.id(),
                            team,
                        });
                        self.share_state();
                    }
                    Err(refusal) => {
                        self.emit(CoreEvent::SeatRefused {
                            session: self.state.id().clone(),
                            client: client.id(),
                            reason: refusal.to_string(),
                        });
                        self.reply(
                            &client,
                            &ServerMessage::error("Could not change seat", refusal.to_string()),
                        );
                    }
                }
            }
            SessionTask::Rename { client, nick } => {
                if self.state.rename(client, nick) {
                    self.share_state();
                }
            }
            SessionTask::Snapshot { reply } => {
                let _ = reply.send(self.state.view(self.executed));
            }
        }

        if *self.state.lifecycle() != lifecycle {
            self.post(SessionOutcome::LifecycleChanged {
                session: self.state.id().clone(),
                lifecycle: *self.state.lifecycle(),
            });
        }

        self.executed += 1;
        let elapsed = started.elapsed();
        if elapsed > self.task_timeout {
            self.emit(CoreEvent::SlowTask {
                session: self.state.id().clone(),
                task: kind,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
        }
    }

    /// Validates a move against the oracle and applies it.
    ///
    /// Rule evaluation runs on the blocking pool; if it misses the deadline
    /// the move is rejected and the board is left as it was.
    #[instrument(skip(self, client), fields(session_id = %self.state.id(), client = %client.id()))]
    async fn play(&mut self, client: &ClientRef, description: MoveDescription) {
        let (team, piece) = match self.state.prepare_move(client.id(), &description) {
            Ok(found) => found,
            Err(refusal) => return self.reject_move(client, refusal.to_string()),
        };

        let oracle = Arc::clone(&self.oracle);
        let board = self.state.board().clone();
        let evaluation =
            tokio::task::spawn_blocking(move || oracle.check(team, &piece, &board, &description));
        let verdict = match tokio::time::timeout(self.task_timeout, evaluation).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => return self.reject_move(client, format!("Rule evaluation failed: {}", e)),
            Err(_) => return self.reject_move(client, "Rule evaluation timed out".to_string()),
        };
        if !verdict.allowed() {
            return self.reject_move(client, verdict.message().to_string());
        }

        let outcome = self.state.apply_move(&description, &verdict);
        self.emit(CoreEvent::MoveApplied {
            session: self.state.id().clone(),
            client: client.id(),
            description,
            captured: outcome.captured.map(|p| p.identity()),
        });
        if let Some(team) = outcome.eliminated {
            self.emit(CoreEvent::TeamEliminated {
                session: self.state.id().clone(),
                team,
            });
        }
        if let Some(winner) = outcome.finished {
            self.emit(CoreEvent::GameFinished {
                session: self.state.id().clone(),
                winner,
            });
        }
        self.share_state();
    }

    fn reject_move(&self, client: &ClientRef, reason: String) {
        self.emit(CoreEvent::MoveRejected {
            session: self.state.id().clone(),
            client: client.id(),
            reason: reason.clone(),
        });
        self.reply(client, &ServerMessage::error("Illegal move", reason));
    }

    fn emit(&self, event: CoreEvent) {
        self.events.emit(event);
    }

    fn post(&self, outcome: SessionOutcome) {
        if self.outcomes.send(outcome).is_err() {
            debug!(session_id = %self.state.id(), "Server no longer reads outcomes");
        }
    }

    fn encode(&self, message: &ServerMessage) -> Option<Vec<u8>> {
        match message.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(session_id = %self.state.id(), error = %e, "Could not encode message");
                None
            }
        }
    }

    fn reply(&self, client: &ClientRef, message: &ServerMessage) {
        if let Some(bytes) = self.encode(message) {
            deliver(self.events.as_ref(), client, bytes);
        }
    }

    fn broadcast(&self, bytes: &[u8]) {
        for player in self.state.players() {
            deliver(self.events.as_ref(), player.client(), bytes.to_vec());
        }
    }

    fn announce(&self, message: &ServerMessage) {
        if let Some(bytes) = self.encode(message) {
            self.broadcast(&bytes);
        }
    }

    fn share_state(&self) {
        let game = self.state.view(self.executed);
        self.announce(&ServerMessage::State { game });
    }
}
