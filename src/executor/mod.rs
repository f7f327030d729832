//! Job executors.
//!
//! An executor turns a job's data map into one unit of work. Executors are
//! chosen by the job's type string; the only built-in type is `http`.

mod http;

pub use http::{HttpExecutorConfig, HttpJobExecutor};

use async_trait::async_trait;
use std::collections::HashMap;

/// Result of attempting to run a job once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The job ran to completion. `succeeded` reflects the executor's own
    /// judgement; the message carries a short human-readable summary.
    Completed { succeeded: bool, message: String },
    /// The job's data map was missing required entries. The attempt never
    /// started and leaves no trace in the execution log.
    Misconfigured(String),
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        ExecutionOutcome::Completed {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ExecutionOutcome::Completed {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Runs one firing of a job from its data map.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, data: &HashMap<String, String>) -> ExecutionOutcome;
}
