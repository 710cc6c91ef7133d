//! Storage Traits
//!
//! This module defines the interfaces of the durable stores the core reads
//! from and writes to:
//! - `EventStore`: append-only log of raw detector events
//! - `ReportStore`: one integrity report per session, upserted
//! - `SessionInfoStore`: interview metadata used to frame a report
//! - `InterviewStore`: scheduled interviews addressed by their join token
//!
//! `Storage` bundles the four so a backend can be shared as a single
//! `Arc<dyn Storage>`. All methods return a `Result` to handle potential storage
//! errors; an upsert either fully replaces the previous value or leaves it
//! untouched.

use async_trait::async_trait;

use crate::error_handling::types::StorageError;
use crate::scoring::report::Report;
use crate::storage::types::{EventQuery, Interview, RawEvent, SessionInfo};

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends an event and returns its storage identifier.
    async fn append(&self, event: RawEvent) -> Result<String, StorageError>;

    /// Retrieves events matching `query`, ordered and limited as requested.
    async fn query(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StorageError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Creates or replaces the report of `session_id` (last write wins).
    async fn upsert(&self, session_id: &str, report: &Report) -> Result<(), StorageError>;

    async fn get(&self, session_id: &str) -> Result<Option<Report>, StorageError>;
}

#[async_trait]
pub trait SessionInfoStore: Send + Sync {
    /// Merges the provided fields into the stored session info and returns
    /// the result.
    async fn upsert_session_info(&self, info: SessionInfo) -> Result<SessionInfo, StorageError>;

    async fn get_session_info(&self, session_id: &str)
        -> Result<Option<SessionInfo>, StorageError>;
}

#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Stores `interview` under its token, replacing any previous one.
    async fn insert_interview(&self, interview: &Interview) -> Result<(), StorageError>;

    async fn get_interview(&self, token: &str) -> Result<Option<Interview>, StorageError>;

    /// Registers the candidate on the interview of `token` and marks it
    /// started. Returns `None` when no interview has that token.
    async fn start_interview(
        &self,
        token: &str,
        candidate_name: Option<String>,
        candidate_email: Option<String>,
    ) -> Result<Option<Interview>, StorageError>;
}

pub trait Storage: EventStore + ReportStore + SessionInfoStore + InterviewStore {}

impl<T> Storage for T where T: EventStore + ReportStore + SessionInfoStore + InterviewStore {}
