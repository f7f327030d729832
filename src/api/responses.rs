//! API response types.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;

use crate::core::job::Trigger;
use crate::storage::ExecutionLogEntry;

/// Sentinel shown when a trigger has never fired.
const NEVER: &str = "Never";
/// Sentinel shown when a trigger has no further fires.
const COMPLETED: &str = "Completed";

fn format_time(time: DateTime<Utc>, tz: Tz) -> String {
    time.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Delete outcome response.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// One job's schedule state, as shown in job listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    pub job_name: String,
    pub job_group: String,
    pub trigger_name: String,
    pub trigger_group: String,
    pub description: String,
    pub job_type: String,
    pub cron_expression: String,
    pub job_data_map: HashMap<String, String>,
    pub state: String,
    /// Formatted local time, or `"Never"` before the first fire.
    pub last_execution_time: String,
    /// Formatted local time, or `"Completed"` once the schedule is exhausted.
    pub next_execution_time: String,
}

impl TriggerInfo {
    pub fn from_trigger(
        trigger: &Trigger,
        description: &str,
        job_type: &str,
        data: &HashMap<String, String>,
        tz: Tz,
    ) -> Self {
        Self {
            job_name: trigger.job_key.name().to_string(),
            job_group: trigger.job_key.group().to_string(),
            trigger_name: trigger.key.name().to_string(),
            trigger_group: trigger.key.group().to_string(),
            description: description.to_string(),
            job_type: job_type.to_string(),
            cron_expression: trigger.cron_expression.clone(),
            job_data_map: data.clone(),
            state: trigger.state.as_str().to_string(),
            last_execution_time: trigger
                .previous_fire
                .map(|t| format_time(t, tz))
                .unwrap_or_else(|| NEVER.to_string()),
            next_execution_time: trigger
                .next_fire
                .map(|t| format_time(t, tz))
                .unwrap_or_else(|| COMPLETED.to_string()),
        }
    }
}

/// One execution history entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogResponse {
    pub id: i64,
    pub job_name: String,
    pub job_group: String,
    pub trigger_name: String,
    pub trigger_group: String,
    pub fire_time: String,
    pub end_time: String,
    pub duration_ms: i64,
    pub status: String,
    pub message: String,
}

impl ExecutionLogResponse {
    pub fn from_entry(entry: &ExecutionLogEntry, tz: Tz) -> Self {
        Self {
            id: entry.id,
            job_name: entry.job_key.name().to_string(),
            job_group: entry.job_key.group().to_string(),
            trigger_name: entry.trigger_key.name().to_string(),
            trigger_group: entry.trigger_key.group().to_string(),
            fire_time: format_time(entry.fire_time, tz),
            end_time: format_time(entry.end_time, tz),
            duration_ms: entry.duration_ms,
            status: entry.status.as_str().to_string(),
            message: entry.message.clone(),
        }
    }
}
