//! Session state and connection management.
//!
//! All relay state lives in one [`SessionState`] behind a single mutex (see
//! [`AppState`]). Each inbound event is dispatched while holding the lock,
//! which keeps the original one-event-at-a-time discipline: no handler ever
//! observes another handler's partial mutation.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use crate::{
    domain::{Audience, ConnectionId, OnlineUser},
    event::ServerEvent,
};

/// Per-connection outbound channel, drained by that connection's pusher task.
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// Shared application state
pub struct AppState {
    pub session: Mutex<SessionState>,
}

/// The relay's process-wide mutable state.
#[derive(Default)]
pub struct SessionState {
    /// Outbound channel per open connection.
    pub(crate) clients: HashMap<ConnectionId, PusherChannel>,
    /// Insertion-ordered roster of announced users. Never pruned on
    /// disconnect; only `updatePosition` mutates existing entries.
    pub(crate) roster: Vec<OnlineUser>,
    /// username -> connection pairs with JS-object semantics: re-claiming a
    /// username overwrites the value in its original slot, a new username
    /// appends. Kept as a Vec so enumeration order is insertion order.
    pub(crate) username_index: Vec<(String, ConnectionId)>,
    /// Per-connection mirror of the client's task list, replaced wholesale
    /// by `updateTasks` and dropped when the connection closes.
    pub(crate) task_cache: HashMap<ConnectionId, Vec<Value>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection's outbound channel.
    pub fn register(&mut self, id: ConnectionId, sender: PusherChannel) {
        self.clients.insert(id, sender);
    }

    /// Tear down a closed connection: drop its outbound channel and task
    /// cache, and prune the first username-index pair (in insertion order)
    /// that points at it. The roster entry is deliberately left in place.
    ///
    /// Returns the released username, if the connection held one.
    pub fn connection_closed(&mut self, id: &ConnectionId) -> Option<String> {
        self.clients.remove(id);
        self.task_cache.remove(id);

        let slot = self.username_index.iter().position(|(_, cid)| cid == id)?;
        let (username, _) = self.username_index.remove(slot);
        Some(username)
    }

    /// Point `username` at `id`, overwriting any earlier claim in place.
    pub fn claim_username(&mut self, username: &str, id: &ConnectionId) {
        match self
            .username_index
            .iter_mut()
            .find(|(name, _)| name == username)
        {
            Some(entry) => entry.1 = id.clone(),
            None => self.username_index.push((username.to_string(), id.clone())),
        }
    }

    /// Current connection claiming `username`, if any.
    pub fn resolve_username(&self, username: &str) -> Option<ConnectionId> {
        self.username_index
            .iter()
            .find(|(name, _)| name == username)
            .map(|(_, cid)| cid.clone())
    }

    pub fn roster(&self) -> &[OnlineUser] {
        &self.roster
    }

    pub fn username_index(&self) -> &[(String, ConnectionId)] {
        &self.username_index
    }

    /// Cached task list for a connection. `None` means no entry at all,
    /// which is distinct from an empty list.
    pub fn tasks_for(&self, id: &ConnectionId) -> Option<&[Value]> {
        self.task_cache.get(id).map(Vec::as_slice)
    }

    pub fn connected_count(&self) -> usize {
        self.clients.len()
    }

    /// Deliver one event to an audience, fire-and-forget.
    ///
    /// A missing or closed target channel is logged and skipped; delivery
    /// failure is never surfaced to the sender.
    pub fn emit(&self, sender: &ConnectionId, event: &ServerEvent, audience: Audience) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize outbound event: {}", e);
                return;
            }
        };

        match audience {
            Audience::All => {
                for (id, tx) in &self.clients {
                    if tx.send(json.clone()).is_err() {
                        tracing::warn!("Failed to push event to client '{}'", id);
                    }
                }
            }
            Audience::AllExceptSender => {
                for (id, tx) in self.clients.iter().filter(|(id, _)| *id != sender) {
                    if tx.send(json.clone()).is_err() {
                        tracing::warn!("Failed to push event to client '{}'", id);
                    }
                }
            }
            Audience::Single(target) => match self.clients.get(&target) {
                Some(tx) => {
                    if tx.send(json).is_err() {
                        tracing::warn!("Failed to push event to client '{}'", target);
                    }
                }
                None => {
                    tracing::warn!("Client '{}' not connected, dropping event", target);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn connect(state: &mut SessionState) -> (ConnectionId, UnboundedReceiver<String>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        state.register(id.clone(), tx);
        (id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    #[test]
    fn test_claim_username_overwrites_in_place() {
        let mut state = SessionState::new();
        let first = ConnectionId::new("c1");
        let second = ConnectionId::new("c2");

        state.claim_username("alice", &first);
        state.claim_username("bob", &ConnectionId::new("c3"));
        state.claim_username("alice", &second);

        // The overwritten claim keeps its original slot.
        assert_eq!(state.username_index().len(), 2);
        assert_eq!(state.username_index()[0].0, "alice");
        assert_eq!(state.resolve_username("alice"), Some(second));
    }

    #[test]
    fn test_connection_closed_removes_first_matching_pair_only() {
        let mut state = SessionState::new();
        let id = ConnectionId::new("c1");

        // Same connection claimed two usernames in a row.
        state.claim_username("alice", &id);
        state.claim_username("alice2", &id);

        let released = state.connection_closed(&id);

        assert_eq!(released, Some("alice".to_string()));
        assert_eq!(state.username_index().len(), 1);
        assert_eq!(state.username_index()[0].0, "alice2");
    }

    #[test]
    fn test_connection_closed_drops_task_cache_but_not_roster() {
        let mut state = SessionState::new();
        let (id, _rx) = connect(&mut state);
        state.task_cache.insert(id.clone(), vec![json!({ "id": 1 })]);
        state.roster.push(OnlineUser {
            id: id.clone(),
            username: "alice".to_string(),
            position: json!({ "x": 0, "y": 0 }),
            character: "fox".to_string(),
        });

        state.connection_closed(&id);

        assert!(state.tasks_for(&id).is_none());
        assert_eq!(state.roster().len(), 1);
        assert_eq!(state.connected_count(), 0);
    }

    #[test]
    fn test_emit_all_includes_sender() {
        let mut state = SessionState::new();
        let (a, mut rx_a) = connect(&mut state);
        let (_b, mut rx_b) = connect(&mut state);

        let event = ServerEvent::ChatMessage {
            id: json!("a"),
            message: json!("hi"),
        };
        state.emit(&a, &event, Audience::All);

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_emit_all_except_sender_skips_sender() {
        let mut state = SessionState::new();
        let (a, mut rx_a) = connect(&mut state);
        let (_b, mut rx_b) = connect(&mut state);

        let event = ServerEvent::UpdatePosition(json!({ "id": "a" }));
        state.emit(&a, &event, Audience::AllExceptSender);

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_emit_single_targets_one_connection() {
        let mut state = SessionState::new();
        let (a, mut rx_a) = connect(&mut state);
        let (b, mut rx_b) = connect(&mut state);
        let (_c, mut rx_c) = connect(&mut state);

        let event = ServerEvent::TaskShared {
            sender: json!("alice"),
            task: json!("standup"),
        };
        state.emit(&a, &event, Audience::Single(b));

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b).len(), 1);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn test_emit_single_to_unknown_target_is_silent() {
        let mut state = SessionState::new();
        let (a, mut rx_a) = connect(&mut state);

        let event = ServerEvent::TaskShared {
            sender: json!("alice"),
            task: json!("standup"),
        };
        state.emit(&a, &event, Audience::Single(ConnectionId::new("ghost")));

        assert!(drain(&mut rx_a).is_empty());
    }
}
