use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::types::{RawEvent, SessionInfo};

/// Error payload of every failed API call.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Event timestamp as posted by detectors: epoch milliseconds or RFC 3339.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    Millis(i64),
    Rfc3339(DateTime<Utc>),
}

impl EventTime {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            EventTime::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            EventTime::Rfc3339(t) => Some(*t),
        }
    }
}

/// Body of `POST /api/events`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEventRequest {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub details: Option<String>,
    pub time: Option<EventTime>,
    pub objects: Option<Vec<String>>,
    pub meta: Option<Value>,
}

impl NewEventRequest {
    /// Builds the event to record, or `None` when `sessionId` or `type` is
    /// missing. A missing or unreadable `time` becomes `now`.
    pub fn into_event(self, now: DateTime<Utc>) -> Option<RawEvent> {
        let session_id = self.session_id.filter(|s| !s.is_empty())?;
        let event_type = self.event_type.filter(|t| !t.is_empty())?;
        let time = self.time.and_then(|t| t.to_utc()).unwrap_or(now);
        let mut event = RawEvent::new(session_id, event_type, time);
        event.details = self.details.unwrap_or_default();
        event.objects = self.objects;
        event.meta = self.meta;
        Some(event)
    }
}

/// Query string of `GET /api/events`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub limit: Option<usize>,
}

/// Body of `POST /api/sessions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: Option<String>,
    pub candidate_name: Option<String>,
    pub started_at: Option<EventTime>,
    pub ended_at: Option<EventTime>,
    pub meta: Option<Value>,
}

impl SessionRequest {
    pub fn into_info(self) -> Option<SessionInfo> {
        let session_id = self.session_id.filter(|s| !s.is_empty())?;
        Some(SessionInfo {
            session_id,
            candidate_name: self.candidate_name,
            started_at: self.started_at.and_then(|t| t.to_utc()),
            ended_at: self.ended_at.and_then(|t| t.to_utc()),
            meta: self.meta,
        })
    }
}

/// Body of `POST /api/interviews/:token/candidate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
}
