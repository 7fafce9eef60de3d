//! Relay error types.
//!
//! There is a single failure class: malformed or missing input on an inbound
//! event. Every variant is handled the same way by the socket loop: log a
//! diagnostic line (the `Display` output includes the offending payload),
//! drop the event, keep the connection open. Nothing is ever sent back to
//! the originating client.

use serde_json::Value;
use thiserror::Error;

use crate::domain::ConnectionId;

#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    /// The frame was not a valid `{"event": ..., "data": ...}` envelope.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// The event name is not part of the catalog.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The payload failed a field-presence or type check.
    #[error("invalid data received for {event}: {payload}")]
    InvalidPayload { event: &'static str, payload: Value },

    /// `shareTask` named a recipient missing from the username index.
    #[error("recipient username not found: {0}")]
    RecipientNotFound(String),

    /// `getTasks` named a connection with no task cache entry.
    #[error("no tasks found for user ID: {0}")]
    TasksNotFound(ConnectionId),
}
