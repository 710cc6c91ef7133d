use std::collections::HashMap;

use crate::session_management::connection::{ConnectionHandle, ConnectionId};

/// One interview session.
///
/// # Fields Overview
///
/// - `candidate`: the most recently joined candidate connection, if any
/// - `viewers`: viewer connections keyed by their own id
/// - `pending_ready`: viewers whose `ready` arrived while no candidate was
///   present, in arrival order and without duplicates
#[derive(Debug, Default)]
pub struct Session {
    pub candidate: Option<ConnectionHandle>,
    pub viewers: HashMap<ConnectionId, ConnectionHandle>,
    pub pending_ready: Vec<ConnectionId>,
}

impl Session {
    /// No candidate and no viewers: the session should be dropped.
    pub fn is_empty(&self) -> bool {
        self.candidate.is_none() && self.viewers.is_empty()
    }

    pub fn is_candidate(&self, id: &str) -> bool {
        self.candidate.as_ref().is_some_and(|c| c.id == id)
    }

    pub fn queue_ready(&mut self, viewer_id: &str) {
        if !self.pending_ready.iter().any(|v| v == viewer_id) {
            self.pending_ready.push(viewer_id.to_string());
        }
    }

    /// Empties the pending set, returning it in FIFO order.
    pub fn take_pending(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.pending_ready)
    }

    /// Removes a viewer and any ready notice it left behind.
    pub fn remove_viewer(&mut self, viewer_id: &str) -> Option<ConnectionHandle> {
        self.pending_ready.retain(|v| v != viewer_id);
        self.viewers.remove(viewer_id)
    }
}
