//! Per-session report assembly and persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::configuration::types::EpisodeConfig;
use crate::configuration::Config;
use crate::error_handling::types::ReportError;
use crate::scoring::episodes::collapse_episodes;
use crate::scoring::integrity::{score, Integrity};
use crate::scoring::labels::object_labels;
use crate::scoring::types::{event_types, EpisodeCounts};
use crate::storage::storage_trait::{EventStore, ReportStore, SessionInfoStore, Storage};
use crate::storage::types::{EventQuery, RawEvent, SessionInfo};

/// Raw (non-debounced) tallies over a session's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub session_id: String,
    pub candidate_name: Option<String>,
    pub total_events: usize,
    pub focus_violations: u32,
    pub no_face_violations: u32,
    pub multiple_faces: u32,
    /// Label -> number of `object-detected` events naming it
    pub objects: BTreeMap<String, u32>,
    pub eyes_closed_events: u32,
    pub drowsiness_events: u32,
    pub background_voice_events: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiagnostics {
    pub total_events: usize,
    pub object_tallies: BTreeMap<String, u32>,
    pub episode_config: EpisodeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub raw: RawDiagnostics,
}

/// The persisted integrity report of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_id: String,
    pub candidate_name: Option<String>,
    /// `HH:MM:SS`
    pub interview_duration: String,
    pub counts: EpisodeCounts,
    pub integrity: Integrity,
    pub time_range: TimeRange,
    pub meta: ReportMeta,
    pub generated_at: DateTime<Utc>,
}

/// A freshly built report together with the summary it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEnvelope {
    pub summary: ReportSummary,
    pub report: Report,
}

/// Formats a millisecond span as `HH:MM:SS`; negative spans read as zero.
pub fn format_duration(ms: i64) -> String {
    let total = ms.max(0) / 1000;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Computes raw tallies over time-ordered `events`.
fn summarize(session_id: &str, events: &[&RawEvent], session: Option<&SessionInfo>) -> ReportSummary {
    let mut summary = ReportSummary {
        session_id: session_id.to_string(),
        candidate_name: session.and_then(|s| s.candidate_name.clone()),
        total_events: events.len(),
        start_time: session
            .and_then(|s| s.started_at)
            .or_else(|| events.first().map(|e| e.time)),
        end_time: session
            .and_then(|s| s.ended_at)
            .or_else(|| events.last().map(|e| e.time)),
        ..Default::default()
    };
    for event in events {
        match event.event_type.as_str() {
            event_types::NOT_LOOKING => summary.focus_violations += 1,
            event_types::NO_FACE => summary.no_face_violations += 1,
            event_types::MULTIPLE_FACES => summary.multiple_faces += 1,
            event_types::EYES_CLOSED => summary.eyes_closed_events += 1,
            event_types::DROWSINESS => summary.drowsiness_events += 1,
            event_types::BACKGROUND_VOICES => summary.background_voice_events += 1,
            event_types::OBJECT_DETECTED => {
                for label in object_labels(event) {
                    *summary.objects.entry(label).or_insert(0) += 1;
                }
            }
            _ => {}
        }
    }
    summary
}

/// Builds the report of `session_id` from its stored events.
///
/// Pure apart from `generated_at`: the same events and configuration always
/// yield the same counts and integrity block.
pub fn build_report(
    session_id: &str,
    events: &[RawEvent],
    session: Option<&SessionInfo>,
    config: &Config,
) -> ReportEnvelope {
    let mut ordered: Vec<&RawEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.time);

    let summary = summarize(session_id, &ordered, session);
    let duration_ms = match (summary.start_time, summary.end_time) {
        (Some(start), Some(end)) => (end - start).num_milliseconds(),
        _ => 0,
    };

    let counts = collapse_episodes(events, &config.episodes);
    let integrity = score(&counts, &config.weights, &config.caps);

    let report = Report {
        session_id: session_id.to_string(),
        candidate_name: summary.candidate_name.clone(),
        interview_duration: format_duration(duration_ms),
        counts,
        integrity,
        time_range: TimeRange {
            start: summary.start_time,
            end: summary.end_time,
        },
        meta: ReportMeta {
            raw: RawDiagnostics {
                total_events: summary.total_events,
                object_tallies: summary.objects.clone(),
                episode_config: config.episodes.clone(),
            },
        },
        generated_at: Utc::now(),
    };
    ReportEnvelope { summary, report }
}

/// Computes and persists reports against a shared store.
pub struct ReportService {
    storage: Arc<dyn Storage>,
    config: Arc<Config>,
}

impl ReportService {
    pub fn new(storage: Arc<dyn Storage>, config: Arc<Config>) -> Self {
        Self { storage, config }
    }

    /// Reads every event of `session_id`, builds its report and upserts it.
    ///
    /// Returns the envelope together with the events it was computed from. On
    /// any storage failure nothing is written.
    pub async fn generate(
        &self,
        session_id: &str,
    ) -> Result<(ReportEnvelope, Vec<RawEvent>), ReportError> {
        if session_id.trim().is_empty() {
            return Err(ReportError::MissingSessionId);
        }
        let events = self
            .storage
            .query(&EventQuery::for_session(session_id))
            .await?;
        let session = self.storage.get_session_info(session_id).await?;
        debug!("[{}] building report over {} events", session_id, events.len());

        let envelope = build_report(session_id, &events, session.as_ref(), &self.config);
        self.storage
            .upsert(session_id, &envelope.report)
            .await
            .map_err(|e| {
                error!("[{}] failed to persist report: {}", session_id, e);
                e
            })?;
        info!(
            "[{}] report generated, integrity score {}",
            session_id, envelope.report.integrity.score
        );
        Ok((envelope, events))
    }

    pub async fn stored(&self, session_id: &str) -> Result<Option<Report>, ReportError> {
        Ok(self.storage.get(session_id).await?)
    }
}
