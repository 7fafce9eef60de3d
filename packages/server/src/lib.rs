//! Session relay for the virtual stand-up space.
//!
//! A thin real-time broadcast relay: clients connect over WebSocket, announce
//! themselves with `joinMeeting`, and the relay fans presence, position,
//! chat, task, and WebRTC-signaling events out to all connections, to all
//! except the sender, or to one addressed recipient. All state is in-memory
//! and lost on restart.

pub mod domain;
pub mod error;
pub mod event;
pub mod handler;
pub mod runner;
pub mod session;
pub mod signal;
pub mod state;
