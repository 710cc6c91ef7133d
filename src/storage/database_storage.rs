//! ORM-based SQLite storage using SeaORM.
//!
//! The schema is derived from the entities in `db_entities` and created on
//! connect if missing. Reports and session info are stored as JSON text keyed
//! by session id, interviews by join token; report upserts use `ON CONFLICT ... DO UPDATE` so a write
//! either replaces the row or leaves it untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Schema,
};

use crate::error_handling::types::StorageError;
use crate::scoring::report::Report;
use crate::storage::db_entities::{events, interviews, reports, sessions};
use crate::storage::storage_trait::{EventStore, InterviewStore, ReportStore, SessionInfoStore};
use crate::storage::types::{EventQuery, Interview, RawEvent, SessionInfo, TimeOrder};

pub struct DatabaseStorage {
    db: DatabaseConnection,
}

fn read_err(e: DbErr) -> StorageError {
    error!("Database read failed: {}", e);
    StorageError::ReadFailed
}

fn write_err(e: DbErr) -> StorageError {
    error!("Database write failed: {}", e);
    StorageError::WriteFailed
}

impl DatabaseStorage {
    /// Opens the database at `url` (e.g. `sqlite://vigil.sqlite3?mode=rwc`) and
    /// ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let db = Database::connect(url).await.map_err(|e| {
            error!("Unable to connect to {}: {}", url, e);
            StorageError::ConnectionFailed
        })?;
        let storage = Self { db };
        storage.create_schema().await?;
        info!("DatabaseStorage ready at {}", url);
        Ok(storage)
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut create_events = schema.create_table_from_entity(events::Entity);
        create_events.if_not_exists();
        let mut create_reports = schema.create_table_from_entity(reports::Entity);
        create_reports.if_not_exists();
        let mut create_sessions = schema.create_table_from_entity(sessions::Entity);
        create_sessions.if_not_exists();
        let mut create_interviews = schema.create_table_from_entity(interviews::Entity);
        create_interviews.if_not_exists();

        for stmt in [
            backend.build(&create_events),
            backend.build(&create_reports),
            backend.build(&create_sessions),
            backend.build(&create_interviews),
        ] {
            self.db.execute(stmt).await.map_err(write_err)?;
        }
        self.db
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_events_session_time ON events (session_id, time_ms)",
            )
            .await
            .map_err(write_err)?;
        Ok(())
    }

    fn to_raw_event(row: events::Model) -> Result<RawEvent, StorageError> {
        let time = DateTime::from_timestamp_millis(row.time_ms).ok_or_else(|| {
            error!("Event {} has out-of-range time {}", row.id, row.time_ms);
            StorageError::ReadFailed
        })?;
        let objects = match row.objects {
            Some(s) => Some(serde_json::from_str(&s)?),
            None => None,
        };
        let meta = match row.meta {
            Some(s) => Some(serde_json::from_str(&s)?),
            None => None,
        };
        Ok(RawEvent {
            session_id: row.session_id,
            event_type: row.event_type,
            time,
            details: row.details,
            objects,
            meta,
        })
    }
}

#[async_trait]
impl EventStore for DatabaseStorage {
    async fn append(&self, event: RawEvent) -> Result<String, StorageError> {
        let objects = match &event.objects {
            Some(o) => Some(serde_json::to_string(o)?),
            None => None,
        };
        let meta = match &event.meta {
            Some(m) => Some(serde_json::to_string(m)?),
            None => None,
        };
        let row = events::ActiveModel {
            session_id: Set(event.session_id),
            event_type: Set(event.event_type),
            time_ms: Set(event.time.timestamp_millis()),
            details: Set(event.details),
            objects: Set(objects),
            meta: Set(meta),
            ..Default::default()
        };
        let res = events::Entity::insert(row)
            .exec(&self.db)
            .await
            .map_err(write_err)?;
        Ok(res.last_insert_id.to_string())
    }

    async fn query(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StorageError> {
        let mut select = events::Entity::find();
        if let Some(ref sid) = query.session_id {
            select = select.filter(events::Column::SessionId.eq(sid.as_str()));
        }
        if let Some(ref t) = query.event_type {
            select = select.filter(events::Column::EventType.eq(t.as_str()));
        }
        select = match query.order {
            TimeOrder::Ascending => select
                .order_by_asc(events::Column::TimeMs)
                .order_by_asc(events::Column::Id),
            TimeOrder::Descending => select
                .order_by_desc(events::Column::TimeMs)
                .order_by_desc(events::Column::Id),
        };
        if let Some(limit) = query.limit {
            select = select.limit(limit as u64);
        }
        let rows = select.all(&self.db).await.map_err(read_err)?;
        rows.into_iter().map(Self::to_raw_event).collect()
    }
}

#[async_trait]
impl ReportStore for DatabaseStorage {
    async fn upsert(&self, session_id: &str, report: &Report) -> Result<(), StorageError> {
        let row = reports::ActiveModel {
            session_id: Set(session_id.to_string()),
            json: Set(serde_json::to_string(report)?),
            generated_at: Set(report.generated_at.to_rfc3339()),
        };
        reports::Entity::insert(row)
            .on_conflict(
                OnConflict::column(reports::Column::SessionId)
                    .update_columns([reports::Column::Json, reports::Column::GeneratedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(write_err)?;
        info!("[{}] report upserted", session_id);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Report>, StorageError> {
        let row = reports::Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await
            .map_err(read_err)?;
        match row {
            Some(r) => Ok(Some(serde_json::from_str(&r.json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SessionInfoStore for DatabaseStorage {
    async fn upsert_session_info(&self, info: SessionInfo) -> Result<SessionInfo, StorageError> {
        let mut current = self
            .get_session_info(&info.session_id)
            .await?
            .unwrap_or_else(|| SessionInfo {
                session_id: info.session_id.clone(),
                ..Default::default()
            });
        current.merge(info);

        let row = sessions::ActiveModel {
            session_id: Set(current.session_id.clone()),
            json: Set(serde_json::to_string(&current)?),
        };
        sessions::Entity::insert(row)
            .on_conflict(
                OnConflict::column(sessions::Column::SessionId)
                    .update_column(sessions::Column::Json)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(write_err)?;
        Ok(current)
    }

    async fn get_session_info(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionInfo>, StorageError> {
        let row = sessions::Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await
            .map_err(read_err)?;
        match row {
            Some(r) => Ok(Some(serde_json::from_str(&r.json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InterviewStore for DatabaseStorage {
    async fn insert_interview(&self, interview: &Interview) -> Result<(), StorageError> {
        let row = interviews::ActiveModel {
            token: Set(interview.token.clone()),
            interview_id: Set(interview.interview_id.clone()),
            session_id: Set(interview.session_id.clone()),
            json: Set(serde_json::to_string(interview)?),
        };
        interviews::Entity::insert(row)
            .on_conflict(
                OnConflict::column(interviews::Column::Token)
                    .update_columns([
                        interviews::Column::InterviewId,
                        interviews::Column::SessionId,
                        interviews::Column::Json,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(write_err)?;
        info!("[{}] interview {} saved", interview.session_id, interview.interview_id);
        Ok(())
    }

    async fn get_interview(&self, token: &str) -> Result<Option<Interview>, StorageError> {
        let row = interviews::Entity::find_by_id(token.to_string())
            .one(&self.db)
            .await
            .map_err(read_err)?;
        match row {
            Some(r) => Ok(Some(serde_json::from_str(&r.json)?)),
            None => Ok(None),
        }
    }

    async fn start_interview(
        &self,
        token: &str,
        candidate_name: Option<String>,
        candidate_email: Option<String>,
    ) -> Result<Option<Interview>, StorageError> {
        let Some(mut interview) = self.get_interview(token).await? else {
            return Ok(None);
        };
        interview.register_candidate(candidate_name, candidate_email, Utc::now());
        self.insert_interview(&interview).await?;
        Ok(Some(interview))
    }
}
