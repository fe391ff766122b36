//! The server's registry of running sessions.
//!
//! The server worker may not read session state, so every entry mirrors the
//! few facts the server needs. Members and lifecycle change only when a
//! session reports an outcome. Joins that were submitted but not yet
//! answered are tracked separately as pending.

use crate::client::ClientId;
use crate::messages::{GameListing, ListOfGames};
use crate::session::{Lifecycle, SEATS, SessionHandle, SessionId};
use derive_getters::Getters;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// One registered session and its mirrored facts.
#[derive(Debug, Clone, Getters)]
pub struct DirectoryEntry {
    handle: SessionHandle,
    title: String,
    owner: ClientId,
    /// Seated clients in join order.
    members: Vec<ClientId>,
    capacity: usize,
    lifecycle: Lifecycle,
    created: u64,
}

impl DirectoryEntry {
    /// Returns true if `client` is seated in this session.
    pub fn has_member(&self, client: ClientId) -> bool {
        self.members.contains(&client)
    }

    /// Returns true once the game can no longer be played.
    pub fn is_over(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Finished | Lifecycle::Abandoned)
    }
}

/// Every registered session, keyed by id.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    entries: HashMap<SessionId, DirectoryEntry>,
    /// Clients whose join was submitted and not yet answered.
    pending: HashMap<ClientId, SessionId>,
    next_seq: u64,
}

impl SessionDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned session whose only member is its owner.
    #[instrument(skip(self, handle), fields(session_id = %handle.id()))]
    pub(crate) fn insert(&mut self, handle: SessionHandle, title: String, owner: ClientId) {
        let created = self.next_seq;
        self.next_seq += 1;
        let entry = DirectoryEntry {
            handle,
            title,
            owner,
            members: vec![owner],
            capacity: SEATS,
            lifecycle: Lifecycle::Waiting,
            created,
        };
        self.entries.insert(entry.handle.id().clone(), entry);
        debug!(sessions = self.entries.len(), "Registered session");
    }

    /// Unregisters a session and forgets joins pending on it.
    pub(crate) fn remove(&mut self, id: &str) -> Option<DirectoryEntry> {
        self.pending.retain(|_, session| session != id);
        self.entries.remove(id)
    }

    /// Looks up a session by id.
    pub fn get(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries.get(id)
    }

    /// Mirrors a successful join.
    pub(crate) fn record_join(&mut self, id: &str, client: ClientId) {
        if let Some(entry) = self.entries.get_mut(id)
            && !entry.members.contains(&client)
        {
            entry.members.push(client);
        }
    }

    /// Mirrors a leave.
    pub(crate) fn record_leave(&mut self, id: &str, client: ClientId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.members.retain(|m| *m != client);
        }
    }

    /// Mirrors a lifecycle change.
    pub(crate) fn record_lifecycle(&mut self, id: &str, lifecycle: Lifecycle) {
        if let Some(entry) = self.entries.get_mut(id) {
            debug!(session_id = %id, from = %entry.lifecycle, to = %lifecycle, "Mirrored lifecycle");
            entry.lifecycle = lifecycle;
        }
    }

    /// Notes that `client` asked to join session `id`.
    pub(crate) fn record_pending(&mut self, client: ClientId, id: SessionId) {
        self.pending.insert(client, id);
    }

    /// Forgets a pending join of `client` on session `id`.
    pub(crate) fn clear_pending(&mut self, client: ClientId, id: &str) {
        if self.pending.get(&client).is_some_and(|session| session == id) {
            self.pending.remove(&client);
        }
    }

    /// Clients whose join on session `id` is still pending.
    pub fn pending_on(&self, id: &str) -> Vec<ClientId> {
        self.pending
            .iter()
            .filter(|(_, session)| *session == id)
            .map(|(client, _)| *client)
            .collect()
    }

    /// Session `client` is waiting to be seated in.
    pub fn pending_for(&self, client: ClientId) -> Option<&DirectoryEntry> {
        self.pending.get(&client).and_then(|id| self.entries.get(id))
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the session `client` created, preferring the newest one still
    /// being played.
    pub fn by_owner(&self, client: ClientId) -> Option<&DirectoryEntry> {
        self.entries
            .values()
            .filter(|e| e.owner == client)
            .min_by_key(|e| (e.is_over(), Reverse(e.created)))
    }

    /// Finds the session `client` is seated in.
    pub fn by_member(&self, client: ClientId) -> Option<&DirectoryEntry> {
        self.entries.values().find(|e| e.has_member(client))
    }

    /// Finds the session `client` is seated in or waiting to join.
    ///
    /// Tasks sent to a pending session run after the join, so they may be
    /// routed there before the seat is confirmed.
    pub fn by_member_or_pending(&self, client: ClientId) -> Option<&DirectoryEntry> {
        self.by_member(client).or_else(|| self.pending_for(client))
    }

    /// Entries in creation order.
    pub fn ordered(&self) -> Vec<&DirectoryEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.created);
        entries
    }

    /// Builds the lobby listing in creation order.
    pub fn listing(&self) -> ListOfGames {
        ListOfGames::new(
            self.ordered()
                .into_iter()
                .map(|e| {
                    GameListing::new(
                        e.handle.id().clone(),
                        e.title.clone(),
                        e.members.len(),
                        e.capacity,
                    )
                })
                .collect(),
        )
    }

    /// Handles of every registered session.
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.entries.values().map(|e| e.handle.clone()).collect()
    }

    /// Removes every entry and returns the handles.
    pub(crate) fn drain(&mut self) -> Vec<SessionHandle> {
        self.pending.clear();
        self.entries.drain().map(|(_, e)| e.handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientRef;
    use crate::events::RecordingSink;
    use crate::session::{GameSession, Player, SessionActor, SessionSettings};
    use chessfor4_rules::{StandardRules, Team};
    use std::sync::Arc;

    fn spawn(id: &str, owner: &ClientRef) -> SessionHandle {
        let player = Player::new(owner.clone(), "o".to_string(), "pid".to_string(), Team::South);
        let state = GameSession::new(id.to_string(), format!("game {}", id), player, false);
        let (outcomes, _ignored) = tokio::sync::mpsc::unbounded_channel();
        SessionActor::spawn(
            state,
            SessionSettings::default(),
            Arc::new(StandardRules),
            Arc::new(RecordingSink::new()),
            outcomes,
        )
    }

    #[tokio::test]
    async fn test_mirror_and_listing_order() {
        let (a, _ra) = ClientRef::new(4);
        let (b, _rb) = ClientRef::new(4);
        let (c, _rc) = ClientRef::new(4);
        let mut directory = SessionDirectory::new();
        directory.insert(spawn("z", &a), "first".to_string(), a.id());
        directory.insert(spawn("y", &b), "second".to_string(), b.id());

        directory.record_join("y", c.id());

        let listing = directory.listing();
        let rows: Vec<_> = listing.games().iter().map(|g| g.players().as_str()).collect();
        assert_eq!(rows, vec!["1/4", "2/4"]);
        assert_eq!(directory.by_member(c.id()).map(|e| e.title().as_str()), Some("second"));
        assert_eq!(directory.by_owner(a.id()).map(|e| e.title().as_str()), Some("first"));

        directory.record_leave("y", c.id());
        assert!(directory.by_member(c.id()).is_none());
    }

    #[tokio::test]
    async fn test_pending_join_and_lifecycle_mirror() {
        let (a, _ra) = ClientRef::new(4);
        let (c, _rc) = ClientRef::new(4);
        let mut directory = SessionDirectory::new();
        directory.insert(spawn("x", &a), "game".to_string(), a.id());

        directory.record_pending(c.id(), "x".to_string());
        assert!(directory.by_member(c.id()).is_none());
        assert_eq!(
            directory.by_member_or_pending(c.id()).map(|e| e.title().as_str()),
            Some("game")
        );

        directory.clear_pending(c.id(), "other");
        assert!(directory.pending_for(c.id()).is_some());
        directory.clear_pending(c.id(), "x");
        assert!(directory.pending_for(c.id()).is_none());

        assert!(!directory.get("x").expect("entry").is_over());
        directory.record_lifecycle("x", Lifecycle::Finished);
        assert!(directory.get("x").expect("entry").is_over());

        directory.record_pending(c.id(), "x".to_string());
        directory.remove("x");
        assert!(directory.pending_for(c.id()).is_none());
    }
}
