//! Job and trigger definitions.
//!
//! A [`JobDefinition`] names a unit of work and carries the opaque data map
//! its executor interprets. A [`Trigger`] is the cron schedule that causes the
//! job to fire. The two are stored and replaced as a pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::JobKey;

/// Job type tag for the built-in HTTP job executor.
pub const JOB_TYPE_HTTP: &str = "http";

/// Lifecycle state of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    /// Armed; has a next fire instant.
    Normal,
    /// Retained but never dispatched. Reserved for administrative control;
    /// no operation in this engine currently sets it.
    Paused,
    /// Terminal; no further fires are scheduled.
    Complete,
}

impl TriggerState {
    /// Stable string form used for persistence and API display.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerState::Normal => "NORMAL",
            TriggerState::Paused => "PAUSED",
            TriggerState::Complete => "COMPLETE",
        }
    }

    /// Parse the stable string form; unknown values default to `Normal`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "PAUSED" => TriggerState::Paused,
            "COMPLETE" => TriggerState::Complete,
            _ => TriggerState::Normal,
        }
    }
}

/// A named unit of work with its executor payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique (name, group) identity.
    pub key: JobKey,
    /// Human-readable description.
    pub description: String,
    /// Which executor interprets the data map (e.g. `"http"`).
    pub job_type: String,
    /// Opaque key/value payload passed to the executor.
    pub data: HashMap<String, String>,
    /// Whether the job may exist with no trigger.
    pub durable: bool,
}

/// A cron schedule bound to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique (name, group) identity, distinct namespace from job keys.
    pub key: JobKey,
    /// The job this trigger fires.
    pub job_key: JobKey,
    /// Six-field cron expression.
    pub cron_expression: String,
    /// Earliest allowed fire instant.
    pub start_at: Option<DateTime<Utc>>,
    /// Latest allowed fire instant.
    pub end_at: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub state: TriggerState,
    /// Instant of the most recent fire, if any.
    pub previous_fire: Option<DateTime<Utc>>,
    /// Instant of the next scheduled fire; `None` means no further fires.
    pub next_fire: Option<DateTime<Utc>>,
}

/// Input to a job upsert: everything needed to create or replace a
/// job/trigger pair.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub group: String,
    pub description: String,
    pub job_type: String,
    pub cron_expression: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub data: HashMap<String, String>,
}

impl JobSpec {
    /// Create a spec with the required fields; everything else defaults.
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            description: String::new(),
            job_type: JOB_TYPE_HTTP.to_string(),
            cron_expression: cron_expression.into(),
            start_at: None,
            end_at: None,
            data: HashMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the job data map.
    pub fn with_data(mut self, data: HashMap<String, String>) -> Self {
        self.data = data;
        self
    }

    /// Set a single data map entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Set the earliest allowed fire instant.
    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Set the latest allowed fire instant.
    pub fn with_end_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    /// The job key this spec addresses.
    pub fn job_key(&self) -> JobKey {
        JobKey::new(self.name.clone(), self.group.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = JobSpec::new("ping", "grp1", "0 */5 * * * ?");
        assert_eq!(spec.job_type, JOB_TYPE_HTTP);
        assert!(spec.data.is_empty());
        assert!(spec.start_at.is_none());
        assert!(spec.end_at.is_none());
    }

    #[test]
    fn test_spec_builder() {
        let spec = JobSpec::new("ping", "grp1", "0 */5 * * * ?")
            .with_description("pings the health endpoint")
            .with_entry("url", "http://localhost:8080/health")
            .with_entry("method", "GET");

        assert_eq!(spec.description, "pings the health endpoint");
        assert_eq!(spec.data.len(), 2);
        assert_eq!(spec.job_key(), JobKey::new("ping", "grp1"));
    }

    #[test]
    fn test_trigger_state_round_trip() {
        for state in [
            TriggerState::Normal,
            TriggerState::Paused,
            TriggerState::Complete,
        ] {
            assert_eq!(TriggerState::from_str_lossy(state.as_str()), state);
        }
    }

    #[test]
    fn test_unknown_state_defaults_to_normal() {
        assert_eq!(
            TriggerState::from_str_lossy("BLOCKED"),
            TriggerState::Normal
        );
    }
}
