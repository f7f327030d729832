//! Storage abstraction for job/trigger records and the execution log.
//!
//! This module provides a trait-based storage abstraction with pluggable
//! backends (in-memory, SQLite). A job and its trigger are persisted as a
//! pair: an upsert replaces both atomically, a delete cascades from the job
//! to its trigger.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::job::{JobDefinition, Trigger};
use crate::core::types::JobKey;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic storage error.
    #[error("storage error: {0}")]
    Other(String),
}

/// Outcome status of one firing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStatus {
    /// The executor reported success.
    Success,
    /// The executor reported failure.
    Failure,
    /// The firing was rejected before execution.
    Vetoed,
}

impl LogStatus {
    /// Stable string form used for persistence and API display.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "SUCCESS",
            LogStatus::Failure => "FAILURE",
            LogStatus::Vetoed => "VETOED",
        }
    }

    /// Parse the stable string form; unknown values default to `Failure`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "SUCCESS" => LogStatus::Success,
            "VETOED" => LogStatus::Vetoed,
            _ => LogStatus::Failure,
        }
    }
}

/// A not-yet-persisted execution log entry; the id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub job_key: JobKey,
    pub trigger_key: JobKey,
    pub fire_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: LogStatus,
    pub message: String,
}

/// The durable record of one firing attempt. Immutable once written; only
/// deleted in bulk by the retention cleaner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Monotonically increasing identifier.
    pub id: i64,
    pub job_key: JobKey,
    pub trigger_key: JobKey,
    pub fire_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: LogStatus,
    pub message: String,
}

impl NewLogEntry {
    fn into_entry(self, id: i64) -> ExecutionLogEntry {
        ExecutionLogEntry {
            id,
            job_key: self.job_key,
            trigger_key: self.trigger_key,
            fire_time: self.fire_time,
            end_time: self.end_time,
            duration_ms: self.duration_ms,
            status: self.status,
            message: self.message,
        }
    }
}

/// Storage trait for persisting scheduler state.
#[async_trait]
pub trait Storage: Send + Sync {
    // Job/trigger operations

    /// Create or fully replace a job and its trigger, atomically.
    async fn upsert_job(&self, job: JobDefinition, trigger: Trigger) -> Result<(), StorageError>;

    /// Get a job and its trigger by job key.
    async fn get_job(&self, key: &JobKey)
        -> Result<Option<(JobDefinition, Trigger)>, StorageError>;

    /// List all jobs with their triggers, ordered by (group, name).
    async fn list_jobs(&self) -> Result<Vec<(JobDefinition, Trigger)>, StorageError>;

    /// Delete a job and its trigger. Returns whether anything was removed.
    async fn delete_job(&self, key: &JobKey) -> Result<bool, StorageError>;

    /// Update the schedule state of an existing trigger (previous/next fire,
    /// lifecycle state) after a firing.
    async fn update_trigger(&self, trigger: &Trigger) -> Result<(), StorageError>;

    // Execution log operations

    /// Append one execution log entry; returns the assigned id.
    async fn append_log(&self, entry: NewLogEntry) -> Result<i64, StorageError>;

    /// List the most recent log entries for a job, ordered by fire time
    /// descending. Returns at most `limit` entries.
    async fn list_logs(
        &self,
        job_key: &JobKey,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError>;

    /// Bulk-delete log entries with a fire time strictly before the cutoff.
    /// Returns the number of deleted entries.
    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
