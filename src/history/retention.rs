//! Scheduled cleanup of old execution log entries.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::cron::CronExpr;
use crate::storage::Storage;

/// Cleanup runs once a day at midnight UTC.
const CLEANUP_CRON: &str = "0 0 0 * * *";

/// Deletes execution log entries older than the retention window.
///
/// A retention of zero or fewer days disables cleanup entirely.
pub struct RetentionCleaner<S> {
    storage: Arc<S>,
    retention_days: i64,
}

impl<S: Storage + 'static> RetentionCleaner<S> {
    pub fn new(storage: Arc<S>, retention_days: i64) -> Self {
        Self {
            storage,
            retention_days,
        }
    }

    /// Delete entries older than the retention window. Returns the number
    /// of deleted entries; zero when retention is disabled.
    pub async fn cleanup(&self) -> u64 {
        if self.retention_days <= 0 {
            debug!("history retention disabled, skipping cleanup");
            return 0;
        }

        let cutoff = Utc::now() - Duration::days(self.retention_days);
        match self.storage.delete_logs_before(cutoff).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(deleted, %cutoff, "removed old execution history");
                }
                deleted
            }
            Err(e) => {
                error!(error = %e, "history cleanup failed");
                0
            }
        }
    }

    /// Spawn the daily cleanup loop. The task runs until the process exits.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            // The expression is a constant; compilation cannot fail.
            let schedule = match CronExpr::parse(CLEANUP_CRON) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "invalid cleanup schedule");
                    return;
                }
            };

            loop {
                let Some(next) = schedule.next_after(Utc::now()) else {
                    return;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                self.cleanup().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::JobKey;
    use crate::storage::{InMemoryStorage, LogStatus, NewLogEntry};
    use chrono::DateTime;

    async fn seed_log(storage: &InMemoryStorage, fire_time: DateTime<Utc>) {
        let key = JobKey::new("ping", "grp1");
        storage
            .append_log(NewLogEntry {
                job_key: key.clone(),
                trigger_key: key.trigger_key(),
                fire_time,
                end_time: fire_time,
                duration_ms: 0,
                status: LogStatus::Success,
                message: String::new(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_entries() {
        let storage = Arc::new(InMemoryStorage::new());
        seed_log(&storage, Utc::now() - Duration::days(15)).await;
        seed_log(&storage, Utc::now() - Duration::days(5)).await;
        seed_log(&storage, Utc::now()).await;

        let cleaner = RetentionCleaner::new(Arc::clone(&storage), 10);
        assert_eq!(cleaner.cleanup().await, 1);

        let remaining = storage
            .list_logs(&JobKey::new("ping", "grp1"), 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_disabled_for_zero_retention() {
        let storage = Arc::new(InMemoryStorage::new());
        seed_log(&storage, Utc::now() - Duration::days(100)).await;

        let cleaner = RetentionCleaner::new(Arc::clone(&storage), 0);
        assert_eq!(cleaner.cleanup().await, 0);

        let remaining = storage
            .list_logs(&JobKey::new("ping", "grp1"), 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_disabled_for_negative_retention() {
        let storage = Arc::new(InMemoryStorage::new());
        seed_log(&storage, Utc::now() - Duration::days(100)).await;

        let cleaner = RetentionCleaner::new(Arc::clone(&storage), -1);
        assert_eq!(cleaner.cleanup().await, 0);
    }
}
