//! In-process trigger registry.
//!
//! The [`TriggerStore`] owns the armed state of every trigger: the compiled
//! cron schedule, the next fire instant, and the lifecycle state. It is NOT
//! thread-safe by itself; exactly one scheduler task owns it and serializes
//! all access. Storage is the durable mirror: mutations persist first, then
//! update the in-memory registry, so a storage failure never leaves the
//! registry ahead of the durable record.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::cron::{CronError, CronExpr};
use crate::core::job::{JobDefinition, JobSpec, Trigger, TriggerState};
use crate::core::types::JobKey;
use crate::storage::{Storage, StorageError};

/// Upper bound on how many overdue occurrences a single catch-up pass will
/// walk through before giving up and re-arming from the current instant.
const MAX_MISFIRE_COLLAPSE: usize = 1000;

/// Errors surfaced by registry mutations.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error(transparent)]
    InvalidCron(#[from] CronError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One trigger that has come due and must be dispatched.
#[derive(Debug, Clone)]
pub struct DueFiring {
    pub job: JobDefinition,
    pub trigger_key: JobKey,
    /// The instant the trigger was scheduled to fire, which can lag the
    /// current instant when fires were missed.
    pub fired_at: DateTime<Utc>,
}

struct Entry {
    job: JobDefinition,
    trigger: Trigger,
    schedule: CronExpr,
}

/// Registry of armed triggers, keyed by job.
pub struct TriggerStore<S> {
    storage: Arc<S>,
    timezone: String,
    entries: HashMap<JobKey, Entry>,
}

impl<S: Storage> TriggerStore<S> {
    /// Create an empty registry. `timezone` is the zone cron fields are
    /// evaluated in (an IANA name such as `"UTC"` or `"Europe/Rome"`).
    pub fn new(storage: Arc<S>, timezone: impl Into<String>) -> Self {
        Self {
            storage,
            timezone: timezone.into(),
            entries: HashMap::new(),
        }
    }

    /// Load persisted jobs and re-arm their triggers.
    ///
    /// A trigger whose next fire instant is in the past stays armed at that
    /// past instant; the first due-check after startup collapses the backlog
    /// into a single catch-up fire. Triggers with an unparseable expression
    /// are skipped with a warning rather than failing the whole load.
    pub async fn load(&mut self, now: DateTime<Utc>) -> Result<usize, SchedulingError> {
        let pairs = self.storage.list_jobs().await?;
        let mut loaded = 0;

        for (job, mut trigger) in pairs {
            let schedule =
                match CronExpr::with_timezone(&trigger.cron_expression, &self.timezone) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(job = %job.key, error = %e, "skipping job with invalid cron expression");
                        continue;
                    }
                };

            if trigger.state == TriggerState::Normal && trigger.next_fire.is_none() {
                trigger.next_fire = schedule.next_after(now);
            }
            if let (Some(end_at), Some(next)) = (trigger.end_at, trigger.next_fire) {
                if next > end_at {
                    trigger.state = TriggerState::Complete;
                    trigger.next_fire = None;
                }
            }

            debug!(job = %job.key, next_fire = ?trigger.next_fire, "re-armed trigger");
            self.entries.insert(
                job.key.clone(),
                Entry {
                    job,
                    trigger,
                    schedule,
                },
            );
            loaded += 1;
        }

        info!(jobs = loaded, "trigger registry loaded");
        Ok(loaded)
    }

    /// Create or fully replace a job and its trigger.
    ///
    /// The first fire instant honors `start_at` as an inclusive boundary.
    /// An `end_at` already behind the first fire produces a trigger born
    /// complete. Returns the armed trigger.
    pub async fn upsert(
        &mut self,
        spec: JobSpec,
        now: DateTime<Utc>,
    ) -> Result<Trigger, SchedulingError> {
        let schedule = CronExpr::with_timezone(&spec.cron_expression, &self.timezone)?;

        let key = spec.job_key();
        let job = JobDefinition {
            key: key.clone(),
            description: spec.description,
            job_type: spec.job_type,
            data: spec.data,
            durable: true,
        };

        let mut next_fire = match spec.start_at {
            Some(start) if start > now => schedule.next_from(start),
            _ => schedule.next_after(now),
        };
        let mut state = TriggerState::Normal;
        match (spec.end_at, next_fire) {
            (Some(end), Some(next)) if next > end => {
                state = TriggerState::Complete;
                next_fire = None;
            }
            (_, None) => state = TriggerState::Complete,
            _ => {}
        }

        let trigger = Trigger {
            key: key.trigger_key(),
            job_key: key.clone(),
            cron_expression: spec.cron_expression,
            start_at: spec.start_at,
            end_at: spec.end_at,
            state,
            previous_fire: None,
            next_fire,
        };

        self.storage.upsert_job(job.clone(), trigger.clone()).await?;

        let replaced = self
            .entries
            .insert(
                key.clone(),
                Entry {
                    job,
                    trigger: trigger.clone(),
                    schedule,
                },
            )
            .is_some();

        info!(job = %key, replaced, next_fire = ?trigger.next_fire, "job scheduled");
        Ok(trigger)
    }

    /// Remove a job and its trigger. Returns whether anything was removed;
    /// deleting an absent job is not an error.
    pub async fn delete(&mut self, key: &JobKey) -> Result<bool, SchedulingError> {
        let removed = self.storage.delete_job(key).await?;
        self.entries.remove(key);
        if removed {
            info!(job = %key, "job deleted");
        }
        Ok(removed)
    }

    /// Look up a job and its trigger.
    pub fn get(&self, key: &JobKey) -> Option<(&JobDefinition, &Trigger)> {
        self.entries.get(key).map(|e| (&e.job, &e.trigger))
    }

    /// All jobs with their triggers, ordered by (group, name).
    pub fn list(&self) -> Vec<(JobDefinition, Trigger)> {
        let mut all: Vec<_> = self
            .entries
            .values()
            .map(|e| (e.job.clone(), e.trigger.clone()))
            .collect();
        all.sort_by(|(a, _), (b, _)| {
            (a.key.group(), a.key.name()).cmp(&(b.key.group(), b.key.name()))
        });
        all
    }

    /// Distinct group names, sorted.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .entries
            .keys()
            .map(|k| k.group().to_string())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    /// Collect every trigger due at `now` and advance its schedule state.
    ///
    /// Missed occurrences collapse into a single catch-up fire: the firing
    /// reports the earliest due instant and the trigger re-arms at the next
    /// occurrence after `now`, keeping the original cadence. The updated
    /// trigger is persisted best-effort; a storage failure is logged and the
    /// in-memory registry stays authoritative.
    pub async fn acquire_due(&mut self, now: DateTime<Utc>) -> Vec<DueFiring> {
        let mut due = Vec::new();

        for entry in self.entries.values_mut() {
            if entry.trigger.state != TriggerState::Normal {
                continue;
            }
            let Some(fire_at) = entry.trigger.next_fire else {
                continue;
            };
            if fire_at > now {
                continue;
            }

            // Walk past occurrences up to now; everything between the due
            // instant and now was missed and is collapsed into this fire.
            let mut next = entry.schedule.next_after(fire_at);
            let mut skipped = 0usize;
            while let Some(candidate) = next {
                if candidate > now || skipped >= MAX_MISFIRE_COLLAPSE {
                    break;
                }
                skipped += 1;
                next = entry.schedule.next_after(candidate);
            }
            if skipped > 0 {
                warn!(
                    job = %entry.job.key,
                    skipped,
                    due = %fire_at,
                    "collapsing missed occurrences into one catch-up fire"
                );
            }

            entry.trigger.previous_fire = Some(fire_at);
            entry.trigger.next_fire = next;
            if let (Some(end_at), Some(upcoming)) = (entry.trigger.end_at, next) {
                if upcoming > end_at {
                    entry.trigger.next_fire = None;
                }
            }
            if entry.trigger.next_fire.is_none() {
                entry.trigger.state = TriggerState::Complete;
                info!(job = %entry.job.key, "trigger completed");
            }

            if let Err(e) = self.storage.update_trigger(&entry.trigger).await {
                warn!(job = %entry.job.key, error = %e, "failed to persist trigger update");
            }

            due.push(DueFiring {
                job: entry.job.clone(),
                trigger_key: entry.trigger.key.clone(),
                fired_at: fire_at,
            });
        }

        due
    }
}
