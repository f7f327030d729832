//! The scheduling engine.
//!
//! A single tokio task owns the trigger registry and is the only authority
//! over timing decisions. Everything else (the HTTP API, shutdown handling)
//! talks to it through a cloneable [`SchedulerHandle`] that sends commands
//! over a channel. Job executions themselves run on spawned tasks so a slow
//! job never stalls the timing loop.

mod engine;
mod handle;

pub use engine::Scheduler;
pub use handle::SchedulerHandle;

use std::time::Duration;
use thiserror::Error;

use crate::store::SchedulingError;

/// Runtime tuning for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// How often the loop checks for due triggers.
    pub tick_interval: Duration,
    /// How long shutdown waits for in-flight jobs before abandoning them.
    pub shutdown_grace: Duration,
    /// Whether a job may fire while a previous firing is still running.
    /// When false, the overlapping fire is vetoed and recorded as such.
    pub allow_overlap: bool,
    /// IANA timezone cron fields are evaluated in.
    pub timezone: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            allow_overlap: true,
            timezone: "UTC".to_string(),
        }
    }
}

/// Errors returned through the scheduler handle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    /// The scheduler task has stopped.
    #[error("scheduler is not running")]
    NotRunning,
}
