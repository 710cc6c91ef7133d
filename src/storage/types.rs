use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timestamped behavioral event as emitted by an external detector.
///
/// Immutable once recorded. `objects` is the normalized label list some
/// detectors attach to `object-detected` events; others only fill `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl RawEvent {
    pub fn new<S: Into<String>, T: Into<String>>(
        session_id: S,
        event_type: T,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            event_type: event_type.into(),
            time,
            details: String::new(),
            objects: None,
            meta: None,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_objects(mut self, objects: Vec<String>) -> Self {
        self.objects = Some(objects);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeOrder {
    #[default]
    Ascending,
    Descending,
}

/// Criteria for `EventStore::query`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub session_id: Option<String>,
    pub event_type: Option<String>,
    /// `None` means every matching event
    pub limit: Option<usize>,
    pub order: TimeOrder,
}

impl EventQuery {
    /// All events of one session in ascending time order.
    pub fn for_session<S: Into<String>>(session_id: S) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &RawEvent) -> bool {
        if let Some(ref sid) = self.session_id {
            if &event.session_id != sid {
                return false;
            }
        }
        if let Some(ref t) = self.event_type {
            if &event.event_type != t {
                return false;
            }
        }
        true
    }

    /// Sorts and truncates an already filtered event list.
    pub fn finish(&self, mut events: Vec<RawEvent>) -> Vec<RawEvent> {
        match self.order {
            TimeOrder::Ascending => events.sort_by_key(|e| e.time),
            TimeOrder::Descending => events.sort_by(|a, b| b.time.cmp(&a.time)),
        }
        if let Some(limit) = self.limit {
            events.truncate(limit);
        }
        events
    }
}

/// Interview metadata used to frame a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl SessionInfo {
    /// Overlays the fields present in `update`, keeping the others.
    pub fn merge(&mut self, update: SessionInfo) {
        if update.candidate_name.is_some() {
            self.candidate_name = update.candidate_name;
        }
        if update.started_at.is_some() {
            self.started_at = update.started_at;
        }
        if update.ended_at.is_some() {
            self.ended_at = update.ended_at;
        }
        if update.meta.is_some() {
            self.meta = update.meta;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewStatus {
    #[default]
    Scheduled,
    Started,
    Ended,
    Cancelled,
}

/// A scheduled interview and the join token a candidate uses to reach its
/// session.
///
/// # Fields Overview
///
/// - `interview_id`: `int-<uuid>`, stable public id
/// - `token`: `join-<uuid>`, the secret part of the candidate link
/// - `session_id`: `sess-<uuid>`, the signaling and event session
/// - `status`: `scheduled` until a candidate registers through the token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub interview_id: String,
    pub token: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    /// A new scheduled interview with freshly generated ids.
    pub fn schedule(now: DateTime<Utc>) -> Self {
        Self {
            interview_id: format!("int-{}", Uuid::new_v4()),
            token: format!("join-{}", Uuid::new_v4()),
            session_id: format!("sess-{}", Uuid::new_v4()),
            title: None,
            interviewer_name: None,
            interviewer_email: None,
            owner_id: None,
            candidate_name: None,
            candidate_email: None,
            scheduled_at: None,
            status: InterviewStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the candidate's details and marks the interview started.
    /// Absent fields keep their current value.
    pub fn register_candidate(
        &mut self,
        name: Option<String>,
        email: Option<String>,
        now: DateTime<Utc>,
    ) {
        if name.is_some() {
            self.candidate_name = name;
        }
        if email.is_some() {
            self.candidate_email = email;
        }
        self.status = InterviewStatus::Started;
        self.updated_at = now;
    }
}
