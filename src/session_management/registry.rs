use std::collections::HashMap;

use log::info;

use crate::session_management::session::Session;

/// In-memory directory of live sessions.
///
/// A value, not a global: the relay owns one for the lifetime of the server,
/// and tests build a fresh one each.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session, creating an empty one on first use.
    pub fn get_or_create(&mut self, session_id: &str) -> &mut Session {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("[{}] session created", session_id);
                Session::default()
            })
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(session_id)
    }

    /// Drops the session if it has neither candidate nor viewers.
    ///
    /// Returns `true` when the session was removed.
    pub fn cleanup(&mut self, session_id: &str) -> bool {
        if self.sessions.get(session_id).is_some_and(Session::is_empty) {
            self.sessions.remove(session_id);
            info!("[{}] session removed", session_id);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
