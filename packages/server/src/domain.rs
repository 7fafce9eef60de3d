//! Core types for the session relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque identifier for one client connection.
///
/// Assigned by the relay when the WebSocket is accepted and invalidated when
/// it closes. Clients never choose their own id; they only learn ids from
/// roster snapshots and `user-joined` notices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh identifier for a newly accepted connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier received inside a client payload (e.g. the
    /// `targetId` of `getTasks`). No format check: ids are opaque strings.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One roster entry, created by `joinMeeting`.
///
/// `position` is kept as raw JSON: `joinMeeting` only checks that the field
/// is present, numeric `x`/`y` is enforced by `updatePosition` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub id: ConnectionId,
    pub username: String,
    pub position: Value,
    pub character: String,
}

/// The set of connections one emission is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connected client, the sender included.
    All,
    /// Every connected client except the sender.
    AllExceptSender,
    /// Exactly one addressed connection.
    Single(ConnectionId),
}
