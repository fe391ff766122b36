//! Profiles and the lobby that holds them.

use crate::client::{ClientId, ClientRef};
use derive_getters::Getters;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Nickname used when a client asks for an empty one.
pub const DEFAULT_NICK: &str = "Player";

/// A connected client's identity within the server.
#[derive(Debug, Clone, Getters)]
pub struct Profile {
    client: ClientRef,
    nick: String,
    secret: String,
    id: String,
}

impl Profile {
    /// Creates a profile with fresh credentials and no nickname.
    #[instrument(skip(client), fields(client = %client.id()))]
    pub fn new(client: ClientRef) -> Self {
        Self {
            client,
            nick: String::new(),
            secret: Uuid::new_v4().to_string(),
            id: Uuid::new_v4().to_string(),
        }
    }
}

/// Every connected client's profile, keyed by connection identity.
///
/// Only the server's dispatch worker holds a mutable reference.
#[derive(Debug, Default)]
pub struct Lobby {
    profiles: HashMap<ClientId, Profile>,
}

impl Lobby {
    /// Creates an empty lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the profile for `client`.
    pub fn get(&self, client: ClientId) -> Option<&Profile> {
        self.profiles.get(&client)
    }

    /// Returns the profile for `client`, creating it if absent.
    ///
    /// The flag is true when a new profile was inserted.
    #[instrument(skip(self, client), fields(client = %client.id()))]
    pub(crate) fn get_or_create(&mut self, client: &ClientRef) -> (&mut Profile, bool) {
        let mut created = false;
        let profile = self.profiles.entry(client.id()).or_insert_with(|| {
            created = true;
            Profile::new(client.clone())
        });
        (profile, created)
    }

    /// Removes the profile for `client`.
    pub(crate) fn remove(&mut self, client: ClientId) -> Option<Profile> {
        self.profiles.remove(&client)
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns true if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Iterates over all profiles.
    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    /// Returns `requested`, or `requested` followed by the smallest number
    /// from 2 upward that no other profile uses as its nickname.
    ///
    /// The profile of `asking` is ignored so a client can keep its own nick.
    #[instrument(skip(self))]
    pub fn unique_nick(&self, requested: &str, asking: ClientId) -> String {
        let taken = |candidate: &str| {
            self.profiles
                .iter()
                .any(|(id, p)| *id != asking && p.nick == candidate)
        };
        let mut nick = requested.to_string();
        let mut suffix = 1u64;
        while taken(&nick) {
            suffix += 1;
            nick = format!("{}{}", requested, suffix);
        }
        debug!(requested, nick = %nick, "Resolved unique nick");
        nick
    }

    /// Assigns an already deduplicated nickname.
    pub(crate) fn set_nick(&mut self, client: ClientId, nick: String) -> Option<&Profile> {
        let profile = self.profiles.get_mut(&client)?;
        profile.nick = nick;
        Some(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut lobby = Lobby::new();
        let (client, _rx) = ClientRef::new(4);

        let first_id = {
            let (profile, created) = lobby.get_or_create(&client);
            assert!(created);
            profile.id().clone()
        };
        let (profile, created) = lobby.get_or_create(&client);

        assert!(!created);
        assert_eq!(profile.id(), &first_id);
        assert_eq!(lobby.len(), 1);
    }

    #[test]
    fn test_unique_nick_suffixes() {
        let mut lobby = Lobby::new();
        let (a, _ra) = ClientRef::new(4);
        let (b, _rb) = ClientRef::new(4);
        let (c, _rc) = ClientRef::new(4);
        for client in [&a, &b, &c] {
            lobby.get_or_create(client);
        }

        let nick = lobby.unique_nick("Alice", a.id());
        lobby.set_nick(a.id(), nick);
        let nick = lobby.unique_nick("Alice", b.id());
        lobby.set_nick(b.id(), nick);
        let nick = lobby.unique_nick("Alice", c.id());

        assert_eq!(lobby.get(b.id()).map(|p| p.nick().as_str()), Some("Alice2"));
        assert_eq!(nick, "Alice3");
    }

    #[test]
    fn test_unique_nick_ignores_self() {
        let mut lobby = Lobby::new();
        let (a, _ra) = ClientRef::new(4);
        lobby.get_or_create(&a);
        lobby.set_nick(a.id(), "Bob".to_string());

        assert_eq!(lobby.unique_nick("Bob", a.id()), "Bob");
    }
}
