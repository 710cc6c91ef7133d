use log::{trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::signaling::messages::ServerMessage;

/// Opaque per-process connection identifier (a UUID v4 string).
pub type ConnectionId = String;

/// Participant role within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    #[serde(alias = "interviewer")]
    Viewer,
}

/// Instruction for the task writing to a connection's socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    Close,
}

/// Write side of a connection.
///
/// Sends never fail from the caller's point of view: a connection whose
/// writer has gone away is simply not writable and the frame is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    tx: UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: UnboundedSender<Outbound>) -> Self {
        Self { id, tx }
    }

    pub fn send(&self, message: ServerMessage) {
        trace!("[{}] <- {:?}", self.id, message);
        if self.tx.send(Outbound::Message(message)).is_err() {
            warn!("[{}] connection not writable, frame dropped", self.id);
        }
    }

    /// Asks the writer to close the socket.
    pub fn close(&self) {
        if self.tx.send(Outbound::Close).is_err() {
            warn!("[{}] close requested on a connection already gone", self.id);
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Relay-side state of one transport connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub handle: ConnectionHandle,
    /// Set by `join`, cleared when the connection leaves or is evicted.
    pub session_id: Option<String>,
    pub role: Option<Role>,
}

impl Connection {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            session_id: None,
            role: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.handle.id
    }

    pub fn detach(&mut self) {
        self.session_id = None;
        self.role = None;
    }
}
