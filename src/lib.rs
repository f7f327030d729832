//! chime - a cron-driven job scheduler with execution history.
//!
//! Jobs are identified by a (name, group) pair and fired by six-field cron
//! triggers. A single scheduler task owns all timing state; jobs execute on
//! spawned tasks and every completed firing is recorded in a durable
//! execution log. An HTTP API manages jobs and exposes the history.

pub mod api;
pub mod config;
pub mod core;
pub mod executor;
pub mod history;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use config::{Config, ConfigError, StorageConfig};
pub use core::cron::{CronError, CronExpr};
pub use core::job::{JobDefinition, JobSpec, Trigger, TriggerState, JOB_TYPE_HTTP};
pub use core::types::JobKey;
pub use executor::{ExecutionOutcome, HttpExecutorConfig, HttpJobExecutor, JobExecutor};
pub use history::{HistoryRecorder, RetentionCleaner};
pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle, SchedulerOptions};
pub use storage::{ExecutionLogEntry, InMemoryStorage, LogStatus, Storage, StorageError};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStorage;
pub use store::{SchedulingError, TriggerStore};
