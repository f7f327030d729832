//! The scheduler task: timing loop, dispatch, and graceful shutdown.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::handle::SchedulerHandle;
use super::SchedulerOptions;
use crate::core::job::{JobDefinition, JobSpec, Trigger};
use crate::core::types::JobKey;
use crate::executor::{ExecutionOutcome, JobExecutor};
use crate::history::{FiringOutcome, HistoryRecorder};
use crate::storage::Storage;
use crate::store::{DueFiring, SchedulingError, TriggerStore};

/// Commands accepted by the scheduler task.
pub(super) enum SchedulerCommand {
    Upsert {
        spec: JobSpec,
        reply: oneshot::Sender<Result<Trigger, SchedulingError>>,
    },
    Delete {
        key: JobKey,
        reply: oneshot::Sender<Result<bool, SchedulingError>>,
    },
    ListJobs {
        reply: oneshot::Sender<Vec<(JobDefinition, Trigger)>>,
    },
    ListGroups {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct RunningFiring {
    job_key: JobKey,
    handle: JoinHandle<()>,
}

/// The scheduler task. Owns the trigger registry; all timing decisions are
/// made here and nowhere else.
pub struct Scheduler<S> {
    store: TriggerStore<S>,
    recorder: HistoryRecorder<S>,
    executors: HashMap<String, Arc<dyn JobExecutor>>,
    options: SchedulerOptions,
    rx: mpsc::Receiver<SchedulerCommand>,
    running: HashMap<u64, RunningFiring>,
    next_firing_id: u64,
}

impl<S: Storage + 'static> Scheduler<S> {
    /// Load persisted jobs, spawn the scheduler task, and return a handle
    /// to it along with the task's join handle.
    pub async fn start(
        storage: Arc<S>,
        executors: HashMap<String, Arc<dyn JobExecutor>>,
        options: SchedulerOptions,
    ) -> Result<(SchedulerHandle, JoinHandle<()>), SchedulingError> {
        let mut store = TriggerStore::new(Arc::clone(&storage), options.timezone.clone());
        store.load(Utc::now()).await?;

        let recorder = HistoryRecorder::new(storage);
        let (tx, rx) = mpsc::channel(64);

        let scheduler = Self {
            store,
            recorder,
            executors,
            options,
            rx,
            running: HashMap::new(),
            next_firing_id: 0,
        };
        let task = tokio::spawn(scheduler.run());
        Ok((SchedulerHandle::new(tx), task))
    }

    async fn run(mut self) {
        info!(
            tick = ?self.options.tick_interval,
            allow_overlap = self.options.allow_overlap,
            "scheduler started"
        );

        let mut tick = tokio::time::interval(self.options.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.prune_finished();
                    let due = self.store.acquire_due(Utc::now()).await;
                    for firing in due {
                        self.dispatch(firing).await;
                    }
                }
                command = self.rx.recv() => match command {
                    Some(SchedulerCommand::Upsert { spec, reply }) => {
                        let result = self.store.upsert(spec, Utc::now()).await;
                        let _ = reply.send(result);
                    }
                    Some(SchedulerCommand::Delete { key, reply }) => {
                        let result = self.store.delete(&key).await;
                        let _ = reply.send(result);
                    }
                    Some(SchedulerCommand::ListJobs { reply }) => {
                        let _ = reply.send(self.store.list());
                    }
                    Some(SchedulerCommand::ListGroups { reply }) => {
                        let _ = reply.send(self.store.groups());
                    }
                    Some(SchedulerCommand::Shutdown { reply }) => {
                        self.drain().await;
                        info!("scheduler stopped");
                        let _ = reply.send(());
                        return;
                    }
                    None => {
                        // All handles dropped; drain and exit.
                        self.drain().await;
                        info!("scheduler stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Spawn one firing, or veto it if the job is already running and
    /// overlap is disallowed.
    async fn dispatch(&mut self, firing: DueFiring) {
        let job_key = firing.job.key.clone();

        if !self.options.allow_overlap && self.is_running(&job_key) {
            warn!(job = %job_key, "vetoing fire: previous firing still running");
            self.recorder
                .record(
                    &job_key,
                    &firing.trigger_key,
                    firing.fired_at,
                    chrono::Duration::zero(),
                    FiringOutcome::Vetoed("previous firing still running".to_string()),
                )
                .await;
            return;
        }

        let Some(executor) = self.executors.get(&firing.job.job_type) else {
            warn!(
                job = %job_key,
                job_type = firing.job.job_type,
                "no executor for job type, skipping"
            );
            return;
        };

        let executor = Arc::clone(executor);
        let recorder = self.recorder.clone();
        let trigger_key = firing.trigger_key;
        let fired_at = firing.fired_at;
        let data = firing.job.data;
        let spawn_key = job_key.clone();

        debug!(job = %job_key, %fired_at, "dispatching job");
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = executor.execute(&data).await;
            let runtime = chrono::Duration::from_std(started.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());

            match outcome {
                ExecutionOutcome::Completed { succeeded, message } => {
                    if succeeded {
                        debug!(job = %spawn_key, "job completed");
                    } else {
                        warn!(job = %spawn_key, message, "job failed");
                    }
                    let outcome = if succeeded {
                        FiringOutcome::Success(message)
                    } else {
                        FiringOutcome::Failure(message)
                    };
                    recorder
                        .record(&spawn_key, &trigger_key, fired_at, runtime, outcome)
                        .await;
                }
                // A misconfigured job never started; nothing to record.
                ExecutionOutcome::Misconfigured(reason) => {
                    warn!(job = %spawn_key, reason, "job skipped: incomplete configuration");
                }
            }
        });

        let id = self.next_firing_id;
        self.next_firing_id += 1;
        self.running.insert(id, RunningFiring { job_key, handle });
    }

    fn is_running(&self, key: &JobKey) -> bool {
        self.running
            .values()
            .any(|f| &f.job_key == key && !f.handle.is_finished())
    }

    fn prune_finished(&mut self) {
        self.running.retain(|_, f| !f.handle.is_finished());
    }

    /// Wait for in-flight jobs up to the grace period, then abandon the
    /// rest.
    async fn drain(&mut self) {
        self.prune_finished();
        if self.running.is_empty() {
            return;
        }

        info!(in_flight = self.running.len(), "waiting for running jobs");
        let deadline = Instant::now() + self.options.shutdown_grace;
        while !self.running.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.prune_finished();
        }

        for (_, firing) in self.running.drain() {
            warn!(job = %firing.job_key, "abandoning job still running at shutdown");
            firing.handle.abort();
        }
    }
}
