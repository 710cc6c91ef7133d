//! In-process storage backend.
//!
//! Keeps events, reports, session info and interviews in `RwLock`-guarded maps. Nothing
//! survives a restart; this is the default backend and the one tests use.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::scoring::report::Report;
use crate::storage::storage_trait::{EventStore, InterviewStore, ReportStore, SessionInfoStore};
use crate::storage::types::{EventQuery, Interview, RawEvent, SessionInfo};

#[derive(Default)]
pub struct MemoryStorage {
    events: RwLock<Vec<RawEvent>>,
    reports: RwLock<HashMap<String, Report>>,
    sessions: RwLock<HashMap<String, SessionInfo>>,
    interviews: RwLock<HashMap<String, Interview>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStorage {
    async fn append(&self, event: RawEvent) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        debug!("[{}] appended {} event {}", event.session_id, event.event_type, id);
        self.events.write().await.push(event);
        Ok(id)
    }

    async fn query(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StorageError> {
        let matched: Vec<RawEvent> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        Ok(query.finish(matched))
    }
}

#[async_trait]
impl ReportStore for MemoryStorage {
    async fn upsert(&self, session_id: &str, report: &Report) -> Result<(), StorageError> {
        self.reports
            .write()
            .await
            .insert(session_id.to_string(), report.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Report>, StorageError> {
        Ok(self.reports.read().await.get(session_id).cloned())
    }
}

#[async_trait]
impl SessionInfoStore for MemoryStorage {
    async fn upsert_session_info(&self, info: SessionInfo) -> Result<SessionInfo, StorageError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(info.session_id.clone())
            .or_insert_with(|| SessionInfo {
                session_id: info.session_id.clone(),
                ..Default::default()
            });
        entry.merge(info);
        Ok(entry.clone())
    }

    async fn get_session_info(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionInfo>, StorageError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }
}

#[async_trait]
impl InterviewStore for MemoryStorage {
    async fn insert_interview(&self, interview: &Interview) -> Result<(), StorageError> {
        self.interviews
            .write()
            .await
            .insert(interview.token.clone(), interview.clone());
        Ok(())
    }

    async fn get_interview(&self, token: &str) -> Result<Option<Interview>, StorageError> {
        Ok(self.interviews.read().await.get(token).cloned())
    }

    async fn start_interview(
        &self,
        token: &str,
        candidate_name: Option<String>,
        candidate_email: Option<String>,
    ) -> Result<Option<Interview>, StorageError> {
        let mut interviews = self.interviews.write().await;
        let Some(interview) = interviews.get_mut(token) else {
            return Ok(None);
        };
        interview.register_candidate(candidate_name, candidate_email, Utc::now());
        debug!("[{}] candidate registered", interview.session_id);
        Ok(Some(interview.clone()))
    }
}
