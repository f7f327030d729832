//! SQLite storage implementation.
//!
//! Provides persistent storage using a SQLite database via sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use super::{ExecutionLogEntry, LogStatus, NewLogEntry, Storage, StorageError};
use crate::core::job::{JobDefinition, Trigger, TriggerState};
use crate::core::types::JobKey;

/// SQLite storage backend.
///
/// Provides persistent storage with automatic schema migration.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| StorageError::Other(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (useful for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let schema = include_str!("../../migrations/001_initial_schema.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Helper functions for time and payload conversion

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn data_map_to_json(data: &HashMap<String, String>) -> Result<String, StorageError> {
    serde_json::to_string(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn data_map_from_json(json: &str) -> Result<HashMap<String, String>, StorageError> {
    serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))
}

type JobRow = (String, String, String, String, String, bool);
type TriggerRow = (
    String,
    String,
    String,
    Option<i64>,
    Option<i64>,
    String,
    Option<i64>,
    Option<i64>,
);

fn job_from_row(row: JobRow) -> Result<JobDefinition, StorageError> {
    Ok(JobDefinition {
        key: JobKey::new(row.0, row.1),
        description: row.2,
        job_type: row.3,
        data: data_map_from_json(&row.4)?,
        durable: row.5,
    })
}

fn trigger_from_row(job_key: JobKey, row: TriggerRow) -> Trigger {
    Trigger {
        key: JobKey::new(row.0, row.1),
        job_key,
        cron_expression: row.2,
        start_at: row.3.map(from_millis),
        end_at: row.4.map(from_millis),
        state: TriggerState::from_str_lossy(&row.5),
        previous_fire: row.6.map(from_millis),
        next_fire: row.7.map(from_millis),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_job(&self, job: JobDefinition, trigger: Trigger) -> Result<(), StorageError> {
        let data_json = data_map_to_json(&job.data)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO jobs (name, group_name, description, job_type, data_map, durable)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.key.name())
        .bind(job.key.group())
        .bind(&job.description)
        .bind(&job.job_type)
        .bind(&data_json)
        .bind(job.durable)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO triggers
                (name, group_name, job_name, job_group, cron_expression,
                 start_at, end_at, state, previous_fire, next_fire)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trigger.key.name())
        .bind(trigger.key.group())
        .bind(trigger.job_key.name())
        .bind(trigger.job_key.group())
        .bind(&trigger.cron_expression)
        .bind(trigger.start_at.map(to_millis))
        .bind(trigger.end_at.map(to_millis))
        .bind(trigger.state.as_str())
        .bind(trigger.previous_fire.map(to_millis))
        .bind(trigger.next_fire.map(to_millis))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))
    }

    async fn get_job(
        &self,
        key: &JobKey,
    ) -> Result<Option<(JobDefinition, Trigger)>, StorageError> {
        let job_row: Option<JobRow> = sqlx::query_as(
            "SELECT name, group_name, description, job_type, data_map, durable
             FROM jobs WHERE group_name = ? AND name = ?",
        )
        .bind(key.group())
        .bind(key.name())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        let Some(job_row) = job_row else {
            return Ok(None);
        };

        let trigger_row: Option<TriggerRow> = sqlx::query_as(
            "SELECT name, group_name, cron_expression, start_at, end_at, state,
                    previous_fire, next_fire
             FROM triggers WHERE job_group = ? AND job_name = ?",
        )
        .bind(key.group())
        .bind(key.name())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        let trigger_row = trigger_row
            .ok_or_else(|| StorageError::Other(format!("job {} has no trigger row", key)))?;

        let job = job_from_row(job_row)?;
        let trigger = trigger_from_row(job.key.clone(), trigger_row);
        Ok(Some((job, trigger)))
    }

    async fn list_jobs(&self) -> Result<Vec<(JobDefinition, Trigger)>, StorageError> {
        type JoinedRow = (
            String,
            String,
            String,
            String,
            String,
            bool,
            String,
            String,
            String,
            Option<i64>,
            Option<i64>,
            String,
            Option<i64>,
            Option<i64>,
        );

        let rows: Vec<JoinedRow> = sqlx::query_as(
            "SELECT j.name, j.group_name, j.description, j.job_type, j.data_map, j.durable,
                    t.name, t.group_name, t.cron_expression, t.start_at, t.end_at, t.state,
                    t.previous_fire, t.next_fire
             FROM jobs j
             JOIN triggers t ON t.job_group = j.group_name AND t.job_name = j.name
             ORDER BY j.group_name, j.name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let job = job_from_row((row.0, row.1, row.2, row.3, row.4, row.5))?;
                let trigger = trigger_from_row(
                    job.key.clone(),
                    (
                        row.6, row.7, row.8, row.9, row.10, row.11, row.12, row.13,
                    ),
                );
                Ok((job, trigger))
            })
            .collect()
    }

    async fn delete_job(&self, key: &JobKey) -> Result<bool, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        sqlx::query("DELETE FROM triggers WHERE job_group = ? AND job_name = ?")
            .bind(key.group())
            .bind(key.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let result = sqlx::query("DELETE FROM jobs WHERE group_name = ? AND name = ?")
            .bind(key.group())
            .bind(key.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_trigger(&self, trigger: &Trigger) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE triggers SET state = ?, previous_fire = ?, next_fire = ?
            WHERE job_group = ? AND job_name = ?
            "#,
        )
        .bind(trigger.state.as_str())
        .bind(trigger.previous_fire.map(to_millis))
        .bind(trigger.next_fire.map(to_millis))
        .bind(trigger.job_key.group())
        .bind(trigger.job_key.name())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("trigger: {}", trigger.key)));
        }
        Ok(())
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<i64, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO execution_logs
                (job_name, job_group, trigger_name, trigger_group,
                 fire_time, end_time, duration_ms, status, message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.job_key.name())
        .bind(entry.job_key.group())
        .bind(entry.trigger_key.name())
        .bind(entry.trigger_key.group())
        .bind(to_millis(entry.fire_time))
        .bind(to_millis(entry.end_time))
        .bind(entry.duration_ms)
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn list_logs(
        &self,
        job_key: &JobKey,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError> {
        type LogRow = (i64, String, String, String, String, i64, i64, i64, String, String);

        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, job_name, job_group, trigger_name, trigger_group,
                    fire_time, end_time, duration_ms, status, message
             FROM execution_logs
             WHERE job_group = ? AND job_name = ?
             ORDER BY fire_time DESC, id DESC
             LIMIT ?",
        )
        .bind(job_key.group())
        .bind(job_key.name())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ExecutionLogEntry {
                id: row.0,
                job_key: JobKey::new(row.1, row.2),
                trigger_key: JobKey::new(row.3, row.4),
                fire_time: from_millis(row.5),
                end_time: from_millis(row.6),
                duration_ms: row.7,
                status: LogStatus::from_str_lossy(&row.8),
                message: row.9,
            })
            .collect())
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM execution_logs WHERE fire_time < ?")
            .bind(to_millis(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
