//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use super::{ExecutionLogEntry, NewLogEntry, Storage, StorageError};
use crate::core::job::{JobDefinition, Trigger};
use crate::core::types::JobKey;

/// In-memory storage backend.
///
/// Thread-safe storage using RwLock for concurrent access.
/// Data is not persisted across restarts.
pub struct InMemoryStorage {
    jobs: RwLock<HashMap<JobKey, (JobDefinition, Trigger)>>,
    logs: RwLock<Vec<ExecutionLogEntry>>,
    next_log_id: AtomicI64,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
            next_log_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_job(&self, job: JobDefinition, trigger: Trigger) -> Result<(), StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| StorageError::LockPoisoned)?;
        jobs.insert(job.key.clone(), (job, trigger));
        Ok(())
    }

    async fn get_job(
        &self,
        key: &JobKey,
    ) -> Result<Option<(JobDefinition, Trigger)>, StorageError> {
        let jobs = self.jobs.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(jobs.get(key).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<(JobDefinition, Trigger)>, StorageError> {
        let jobs = self.jobs.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<_> = jobs.values().cloned().collect();
        result.sort_by(|(a, _), (b, _)| {
            (a.key.group(), a.key.name()).cmp(&(b.key.group(), b.key.name()))
        });
        Ok(result)
    }

    async fn delete_job(&self, key: &JobKey) -> Result<bool, StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(jobs.remove(key).is_some())
    }

    async fn update_trigger(&self, trigger: &Trigger) -> Result<(), StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| StorageError::LockPoisoned)?;
        let entry = jobs
            .get_mut(&trigger.job_key)
            .ok_or_else(|| StorageError::NotFound(format!("trigger: {}", trigger.key)))?;
        entry.1 = trigger.clone();
        Ok(())
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<i64, StorageError> {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        let mut logs = self.logs.write().map_err(|_| StorageError::LockPoisoned)?;
        logs.push(entry.into_entry(id));
        Ok(id)
    }

    async fn list_logs(
        &self,
        job_key: &JobKey,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError> {
        let logs = self.logs.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<_> = logs
            .iter()
            .filter(|e| &e.job_key == job_key)
            .cloned()
            .collect();
        // Most recent first; id breaks ties between same-instant fires.
        result.sort_by(|a, b| (b.fire_time, b.id).cmp(&(a.fire_time, a.id)));
        result.truncate(limit);
        Ok(result)
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut logs = self.logs.write().map_err(|_| StorageError::LockPoisoned)?;
        let before = logs.len();
        logs.retain(|e| e.fire_time >= cutoff);
        Ok((before - logs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::TriggerState;
    use crate::storage::LogStatus;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    fn job(name: &str, group: &str) -> (JobDefinition, Trigger) {
        let key = JobKey::new(name, group);
        let job = JobDefinition {
            key: key.clone(),
            description: format!("{} job", name),
            job_type: "http".to_string(),
            data: HashMap::new(),
            durable: true,
        };
        let trigger = Trigger {
            key: key.trigger_key(),
            job_key: key,
            cron_expression: "0 */5 * * * ?".to_string(),
            start_at: None,
            end_at: None,
            state: TriggerState::Normal,
            previous_fire: None,
            next_fire: Some(Utc::now()),
        };
        (job, trigger)
    }

    fn log_entry(name: &str, group: &str, fire_time: DateTime<Utc>) -> NewLogEntry {
        let key = JobKey::new(name, group);
        NewLogEntry {
            job_key: key.clone(),
            trigger_key: key.trigger_key(),
            fire_time,
            end_time: fire_time + Duration::milliseconds(25),
            duration_ms: 25,
            status: LogStatus::Success,
            message: "ok".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_job() {
        let storage = InMemoryStorage::new();
        let (job, trigger) = job("ping", "grp1");

        storage.upsert_job(job, trigger).await.unwrap();
        let (stored, stored_trigger) = storage
            .get_job(&JobKey::new("ping", "grp1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored.description, "ping job");
        assert_eq!(stored_trigger.key.name(), "ping_trigger");
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_pair() {
        let storage = InMemoryStorage::new();
        let (job1, trigger1) = job("ping", "grp1");
        storage.upsert_job(job1, trigger1).await.unwrap();

        let (mut job2, mut trigger2) = job("ping", "grp1");
        job2.description = "replaced".to_string();
        trigger2.cron_expression = "0 0 * * * ?".to_string();
        storage.upsert_job(job2, trigger2).await.unwrap();

        let all = storage.list_jobs().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0.description, "replaced");
        assert_eq!(all[0].1.cron_expression, "0 0 * * * ?");
    }

    #[tokio::test]
    async fn test_list_jobs_ordered_by_group_then_name() {
        let storage = InMemoryStorage::new();
        for (name, group) in [("b", "g2"), ("a", "g1"), ("c", "g1")] {
            let (j, t) = job(name, group);
            storage.upsert_job(j, t).await.unwrap();
        }

        let all = storage.list_jobs().await.unwrap();
        let keys: Vec<String> = all.iter().map(|(j, _)| j.key.to_string()).collect();
        assert_eq!(keys, vec!["g1/a", "g1/c", "g2/b"]);
    }

    #[tokio::test]
    async fn test_delete_job_is_idempotent() {
        let storage = InMemoryStorage::new();
        let (j, t) = job("ping", "grp1");
        storage.upsert_job(j, t).await.unwrap();

        let key = JobKey::new("ping", "grp1");
        assert!(storage.delete_job(&key).await.unwrap());
        assert!(!storage.delete_job(&key).await.unwrap());
        assert!(storage.get_job(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_trigger() {
        let storage = InMemoryStorage::new();
        let (j, mut t) = job("ping", "grp1");
        storage.upsert_job(j, t.clone()).await.unwrap();

        let fired = Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap();
        t.previous_fire = Some(fired);
        t.state = TriggerState::Complete;
        t.next_fire = None;
        storage.update_trigger(&t).await.unwrap();

        let (_, stored) = storage
            .get_job(&JobKey::new("ping", "grp1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.previous_fire, Some(fired));
        assert_eq!(stored.state, TriggerState::Complete);
        assert!(stored.next_fire.is_none());
    }

    #[tokio::test]
    async fn test_update_trigger_for_missing_job_fails() {
        let storage = InMemoryStorage::new();
        let (_, t) = job("ghost", "grp1");
        let result = storage.update_trigger(&t).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_log_ids_are_monotonic() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();

        let id1 = storage.append_log(log_entry("a", "g", now)).await.unwrap();
        let id2 = storage.append_log(log_entry("a", "g", now)).await.unwrap();
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn test_list_logs_descending_with_limit() {
        let storage = InMemoryStorage::new();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        for i in 0..5 {
            storage
                .append_log(log_entry("ping", "grp1", base + Duration::minutes(i)))
                .await
                .unwrap();
        }
        storage
            .append_log(log_entry("other", "grp1", base))
            .await
            .unwrap();

        let logs = storage
            .list_logs(&JobKey::new("ping", "grp1"), 3)
            .await
            .unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].fire_time, base + Duration::minutes(4));
        assert_eq!(logs[2].fire_time, base + Duration::minutes(2));
    }

    #[tokio::test]
    async fn test_delete_logs_before_cutoff() {
        let storage = InMemoryStorage::new();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        for i in 0..4 {
            storage
                .append_log(log_entry("ping", "grp1", base + Duration::days(i)))
                .await
                .unwrap();
        }

        let deleted = storage
            .delete_logs_before(base + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let remaining = storage
            .list_logs(&JobKey::new("ping", "grp1"), 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 2);
        // An entry exactly at the cutoff survives.
        assert!(remaining
            .iter()
            .all(|e| e.fire_time >= base + Duration::days(2)));
    }

    #[tokio::test]
    async fn test_storage_is_thread_safe() {
        use std::sync::Arc;

        let storage = Arc::new(InMemoryStorage::new());
        let mut handles = vec![];

        for i in 0..10 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                let (j, t) = job(&format!("job_{}", i), "grp");
                storage.upsert_job(j, t).await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.list_jobs().await.unwrap().len(), 10);
    }
}
