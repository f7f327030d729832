//! Execution history recording.
//!
//! Every completed or vetoed firing is written to the execution log through
//! the [`HistoryRecorder`]. Recording is best-effort: a storage failure is
//! logged and swallowed so that it can never take down the scheduler loop.

mod retention;

pub use retention::RetentionCleaner;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::error;

use crate::core::types::JobKey;
use crate::storage::{LogStatus, NewLogEntry, Storage};

/// Longest message persisted per log entry. Longer messages are truncated
/// with a trailing ellipsis.
const MAX_MESSAGE_LEN: usize = 4000;

/// How a firing ended, from the history's point of view.
#[derive(Debug, Clone)]
pub enum FiringOutcome {
    Success(String),
    Failure(String),
    Vetoed(String),
}

impl FiringOutcome {
    fn into_parts(self) -> (LogStatus, String) {
        match self {
            FiringOutcome::Success(m) => (LogStatus::Success, m),
            FiringOutcome::Failure(m) => (LogStatus::Failure, m),
            FiringOutcome::Vetoed(m) => (LogStatus::Vetoed, m),
        }
    }
}

fn truncate_message(message: String) -> String {
    // The limit counts characters, not bytes.
    match message.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message,
    }
}

/// Writes firing outcomes to the execution log.
pub struct HistoryRecorder<S> {
    storage: Arc<S>,
}

impl<S> Clone for HistoryRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> HistoryRecorder<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Record one firing. `fired_at` is the instant the trigger was due;
    /// `runtime` is how long the attempt took (zero for vetoed firings).
    pub async fn record(
        &self,
        job_key: &JobKey,
        trigger_key: &JobKey,
        fired_at: DateTime<Utc>,
        runtime: Duration,
        outcome: FiringOutcome,
    ) {
        let (status, message) = outcome.into_parts();
        let entry = NewLogEntry {
            job_key: job_key.clone(),
            trigger_key: trigger_key.clone(),
            fire_time: fired_at,
            end_time: fired_at + runtime,
            duration_ms: runtime.num_milliseconds(),
            status,
            message: truncate_message(message),
        };

        if let Err(e) = self.storage.append_log(entry).await {
            error!(job = %job_key, error = %e, "failed to record execution history");
        }
    }
}
