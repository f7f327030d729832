//! Client-side handle to the scheduler task.

use tokio::sync::{mpsc, oneshot};

use super::engine::SchedulerCommand;
use super::SchedulerError;
use crate::core::job::{JobDefinition, JobSpec, Trigger};
use crate::core::types::JobKey;

/// Cloneable handle for talking to the running scheduler.
///
/// Every method round-trips a command through the scheduler task, so results
/// reflect a single consistent view of the trigger registry.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub(super) fn new(tx: mpsc::Sender<SchedulerCommand>) -> Self {
        Self { tx }
    }

    async fn send<T>(
        &self,
        command: SchedulerCommand,
        reply: oneshot::Receiver<T>,
    ) -> Result<T, SchedulerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SchedulerError::NotRunning)?;
        reply.await.map_err(|_| SchedulerError::NotRunning)
    }

    /// Create or fully replace a job and its trigger. Returns the armed
    /// trigger.
    pub async fn schedule_job(&self, spec: JobSpec) -> Result<Trigger, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(
            SchedulerCommand::Upsert {
                spec,
                reply: reply_tx,
            },
            reply_rx,
        )
        .await?
        .map_err(SchedulerError::from)
    }

    /// Delete a job and its trigger. Returns whether anything was removed.
    pub async fn delete_job(&self, key: JobKey) -> Result<bool, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(
            SchedulerCommand::Delete {
                key,
                reply: reply_tx,
            },
            reply_rx,
        )
        .await?
        .map_err(SchedulerError::from)
    }

    /// List all jobs with their triggers, ordered by (group, name).
    pub async fn list_jobs(&self) -> Result<Vec<(JobDefinition, Trigger)>, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::ListJobs { reply: reply_tx }, reply_rx)
            .await
    }

    /// List distinct job group names.
    pub async fn list_groups(&self) -> Result<Vec<String>, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::ListGroups { reply: reply_tx }, reply_rx)
            .await
    }

    /// Stop the scheduler, waiting for in-flight jobs up to the configured
    /// grace period. Resolves once the loop has exited.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::Shutdown { reply: reply_tx }, reply_rx)
            .await
    }
}
