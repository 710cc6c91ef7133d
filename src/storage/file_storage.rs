//! Filesystem-backed storage.
//!
//! Layout under the base directory:
//! - `events/<session>.jsonl`: one JSON event per line, append-only
//! - `reports/<session>.json`: latest report, replaced through a temp file and
//!   a rename so readers never observe a partial write
//! - `sessions/<session>.json`: merged session info
//! - `interviews/<token>.json`: one interview per join token

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::scoring::report::Report;
use crate::storage::storage_trait::{EventStore, InterviewStore, ReportStore, SessionInfoStore};
use crate::storage::types::{EventQuery, Interview, RawEvent, SessionInfo};

pub struct FileStorage {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub async fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        for dir in ["events", "reports", "sessions", "interviews"] {
            let path = base_path.join(dir);
            fs::create_dir_all(&path).await.map_err(|e| {
                error!("Failed to create {} dir {}: {}", dir, path.display(), e);
                StorageError::WriteFailed
            })?;
        }
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    fn events_dir(&self) -> PathBuf {
        self.base_path.join("events")
    }

    fn events_file(&self, session_id: &str) -> PathBuf {
        self.events_dir().join(format!("{}.jsonl", file_stem(session_id)))
    }

    fn report_file(&self, session_id: &str) -> PathBuf {
        self.base_path
            .join("reports")
            .join(format!("{}.json", file_stem(session_id)))
    }

    fn session_file(&self, session_id: &str) -> PathBuf {
        self.base_path
            .join("sessions")
            .join(format!("{}.json", file_stem(session_id)))
    }

    fn interview_file(&self, token: &str) -> PathBuf {
        self.base_path
            .join("interviews")
            .join(format!("{}.json", file_stem(token)))
    }

    async fn read_events_file(&self, path: &Path) -> Result<Vec<RawEvent>, StorageError> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                error!("Read failed {}: {}", path.display(), e);
                return Err(StorageError::ReadFailed);
            }
        };
        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let event: RawEvent = serde_json::from_str(line).map_err(|e| {
                error!("Corrupt event line in {}: {}", path.display(), e);
                StorageError::ReadFailed
            })?;
            events.push(event);
        }
        Ok(events)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                error!("Read failed {}: {}", path.display(), e);
                Err(StorageError::ReadFailed)
            }
        }
    }

    /// Writes `bytes` next to `path` and renames it into place.
    async fn replace_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, bytes).await.map_err(|e| {
            error!("Write failed {}: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        if let Err(e) = fs::rename(&tmp, path).await {
            error!("Rename failed {} -> {}: {}", tmp.display(), path.display(), e);
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::WriteFailed);
        }
        Ok(())
    }
}

/// Maps an opaque id onto a safe file name.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            stem.push(b as char);
        } else {
            stem.push_str(&format!("%{:02X}", b));
        }
    }
    stem
}

#[async_trait]
impl EventStore for FileStorage {
    async fn append(&self, event: RawEvent) -> Result<String, StorageError> {
        let path = self.events_file(&event.session_id);
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!("Open append failed {}: {}", path.display(), e);
                StorageError::WriteFailed
            })?;
        f.write_all(&line).await.map_err(|e| {
            error!("Write failed {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        f.flush().await.map_err(|e| {
            error!("Flush failed {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        debug!("[{}] appended {} event to {}", event.session_id, event.event_type, path.display());
        Ok(Uuid::new_v4().to_string())
    }

    async fn query(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StorageError> {
        let mut events = Vec::new();
        match &query.session_id {
            Some(sid) => events = self.read_events_file(&self.events_file(sid)).await?,
            None => {
                let dir = self.events_dir();
                let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                    error!("Failed to read events dir {}: {}", dir.display(), e);
                    StorageError::ReadFailed
                })?;
                while let Some(entry) = entries.next_entry().await.map_err(|e| {
                    error!("Dir entry error: {}", e);
                    StorageError::ReadFailed
                })? {
                    let path = entry.path();
                    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                        events.extend(self.read_events_file(&path).await?);
                    }
                }
            }
        }
        events.retain(|e| query.matches(e));
        Ok(query.finish(events))
    }
}

#[async_trait]
impl ReportStore for FileStorage {
    async fn upsert(&self, session_id: &str, report: &Report) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(report)?;
        let path = self.report_file(session_id);
        let _guard = self.write_lock.lock().await;
        self.replace_file(&path, &bytes).await?;
        info!("[{}] report saved to {}", session_id, path.display());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Report>, StorageError> {
        self.read_json(&self.report_file(session_id)).await
    }
}

#[async_trait]
impl SessionInfoStore for FileStorage {
    async fn upsert_session_info(&self, info: SessionInfo) -> Result<SessionInfo, StorageError> {
        let path = self.session_file(&info.session_id);
        let _guard = self.write_lock.lock().await;
        let mut current: SessionInfo = self.read_json(&path).await?.unwrap_or_else(|| SessionInfo {
            session_id: info.session_id.clone(),
            ..Default::default()
        });
        current.merge(info);
        let bytes = serde_json::to_vec_pretty(&current)?;
        self.replace_file(&path, &bytes).await?;
        Ok(current)
    }

    async fn get_session_info(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionInfo>, StorageError> {
        self.read_json(&self.session_file(session_id)).await
    }
}

#[async_trait]
impl InterviewStore for FileStorage {
    async fn insert_interview(&self, interview: &Interview) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(interview)?;
        let path = self.interview_file(&interview.token);
        let _guard = self.write_lock.lock().await;
        self.replace_file(&path, &bytes).await?;
        info!("[{}] interview {} saved", interview.session_id, interview.interview_id);
        Ok(())
    }

    async fn get_interview(&self, token: &str) -> Result<Option<Interview>, StorageError> {
        self.read_json(&self.interview_file(token)).await
    }

    async fn start_interview(
        &self,
        token: &str,
        candidate_name: Option<String>,
        candidate_email: Option<String>,
    ) -> Result<Option<Interview>, StorageError> {
        let path = self.interview_file(token);
        let _guard = self.write_lock.lock().await;
        let Some(mut interview) = self.read_json::<Interview>(&path).await? else {
            return Ok(None);
        };
        interview.register_candidate(candidate_name, candidate_email, Utc::now());
        let bytes = serde_json::to_vec_pretty(&interview)?;
        self.replace_file(&path, &bytes).await?;
        debug!("[{}] candidate registered", interview.session_id);
        Ok(Some(interview))
    }
}
