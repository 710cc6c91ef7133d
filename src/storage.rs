//! Storage subsystem
//!
//! This module provides the durable stores the core reads events from and
//! writes reports to.
//!
//! Components:
//! - `storage_trait`: the `EventStore`, `ReportStore`, `SessionInfoStore` and `InterviewStore` traits.
//! - `types`: shared data types used by storage backends.
//! - `memory_storage`: in-process maps, the default backend.
//! - `file_storage`: filesystem-backed implementation for simple persistence and inspection.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `db_entities`: SeaORM entity models for the database backend.

use std::sync::Arc;

use log::error;

use crate::configuration::types::{StorageBackend, StorageConfig};
use crate::error_handling::types::StorageError;

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod memory_storage;
pub mod storage_trait;
pub mod types;

pub use storage_trait::Storage;

/// Opens the backend selected by `config`.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(memory_storage::MemoryStorage::new())),
        StorageBackend::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                error!("File storage selected without a path");
                StorageError::ConnectionFailed
            })?;
            Ok(Arc::new(file_storage::FileStorage::new(path).await?))
        }
        StorageBackend::Database => Ok(Arc::new(
            database_storage::DatabaseStorage::connect(&config.database_url).await?,
        )),
    }
}
