//! Remote listener registry
//!
//! Tracks the last known playback position and play/pause state of
//! every other participant in the session, keyed by username. Pure
//! in-memory map; no transport knowledge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Play/pause state reported by a remote listener
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Playing,
    Paused,
}

/// A remote participant in the same session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listener {
    pub username: String,
    pub position: f64,
    pub state: PlaybackStatus,
}

impl Listener {
    pub fn new(username: impl Into<String>, position: f64) -> Self {
        Self {
            username: username.into(),
            position,
            state: PlaybackStatus::Playing,
        }
    }
}

/// Registry of remote listeners, keyed uniquely by username
///
/// Only this registry may mutate `Listener` entries. Joins are inserts,
/// never overwrites: a duplicate `user_joined` (common after a
/// reconnect) must not reset a listener's reported progress.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Listener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a listener if absent; no-op when the username is already
    /// known (first-insert wins)
    pub fn upsert(&mut self, username: &str, position: f64) {
        if self.listeners.contains_key(username) {
            tracing::debug!(username, "duplicate join ignored");
            return;
        }
        self.listeners
            .insert(username.to_string(), Listener::new(username, position));
    }

    /// Remove a listener; returns the removed entry if it existed
    pub fn remove(&mut self, username: &str) -> Option<Listener> {
        self.listeners.remove(username)
    }

    /// Update a listener's reported position; no-op for unknown names
    pub fn update_position(&mut self, username: &str, position: f64) {
        if let Some(listener) = self.listeners.get_mut(username) {
            listener.position = position;
        }
    }

    /// Update a listener's play/pause state; no-op for unknown names
    pub fn update_state(&mut self, username: &str, state: PlaybackStatus) {
        if let Some(listener) = self.listeners.get_mut(username) {
            listener.state = state;
        }
    }

    /// Replace the registry wholesale (for `current_listeners` frames)
    pub fn replace(&mut self, listeners: Vec<Listener>) {
        self.listeners = listeners
            .into_iter()
            .map(|l| (l.username.clone(), l))
            .collect();
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn get(&self, username: &str) -> Option<&Listener> {
        self.listeners.get(username)
    }

    /// Current listeners, sorted by username for deterministic output
    pub fn snapshot(&self) -> Vec<Listener> {
        let mut listeners: Vec<Listener> = self.listeners.values().cloned().collect();
        listeners.sort_by(|a, b| a.username.cmp(&b.username));
        listeners
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_is_first_insert_wins() {
        let mut registry = ListenerRegistry::new();
        registry.upsert("alice", 12.0);
        registry.upsert("alice", 99.0);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alice").unwrap().position, 12.0);
    }

    #[test]
    fn test_update_position_and_state() {
        let mut registry = ListenerRegistry::new();
        registry.upsert("bob", 0.0);

        registry.update_position("bob", 42.5);
        registry.update_state("bob", PlaybackStatus::Paused);

        let bob = registry.get("bob").unwrap();
        assert_eq!(bob.position, 42.5);
        assert_eq!(bob.state, PlaybackStatus::Paused);
    }

    #[test]
    fn test_update_unknown_listener_is_noop() {
        let mut registry = ListenerRegistry::new();
        registry.update_position("ghost", 1.0);
        registry.update_state("ghost", PlaybackStatus::Paused);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut registry = ListenerRegistry::new();
        registry.upsert("alice", 5.0);

        assert!(registry.remove("alice").is_some());
        assert!(registry.remove("alice").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_wholesale() {
        let mut registry = ListenerRegistry::new();
        registry.upsert("alice", 5.0);

        registry.replace(vec![Listener::new("carol", 7.0), Listener::new("bob", 3.0)]);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("alice").is_none());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].username, "bob");
        assert_eq!(snapshot[1].username, "carol");
    }
}
