//! Session management core module.
//!
//! This module holds the in-memory directory of live interview sessions and
//! the participant connections bound to them. It is owned by the signaling
//! relay and mutated from a single task, so nothing here is locked.

/// Connection handles and participant roles.
pub mod connection;
/// Directory of live sessions.
pub mod registry;
/// One interview session and its participants.
pub mod session;

pub use connection::{Connection, ConnectionHandle, ConnectionId, Outbound, Role};
pub use registry::SessionRegistry;
pub use session::Session;
