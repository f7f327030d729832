//! API request handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::job::JobSpec;
use crate::core::types::JobKey;
use crate::scheduler::SchedulerHandle;
use crate::storage::Storage;

use super::errors::ApiError;
use super::responses::{DeleteResponse, ExecutionLogResponse, HealthResponse, TriggerInfo};

/// At most this many history entries are returned per job.
const HISTORY_LIMIT: usize = 20;

/// Shared application state for API handlers.
pub struct ApiState<S: Storage> {
    pub handle: SchedulerHandle,
    pub storage: Arc<S>,
    pub timezone: Tz,
}

impl<S: Storage> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            storage: Arc::clone(&self.storage),
            timezone: self.timezone,
        }
    }
}

/// Request body for creating or replacing a job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_name: String,
    pub job_group: String,
    #[serde(default)]
    pub description: String,
    pub cron_expression: String,
    /// Epoch milliseconds; the first fire happens at or after this instant.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Epoch milliseconds; no fires happen after this instant.
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub job_data_map: HashMap<String, String>,
}

impl JobRequest {
    fn into_spec(self) -> Result<JobSpec, ApiError> {
        let mut spec = JobSpec::new(self.job_name, self.job_group, self.cron_expression)
            .with_description(self.description)
            .with_data(self.job_data_map);

        if let Some(millis) = self.start_time {
            let start = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid startTime: {}", millis)))?;
            spec = spec.with_start_at(start);
        }
        if let Some(millis) = self.end_time {
            let end = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid endTime: {}", millis)))?;
            spec = spec.with_end_at(end);
        }
        Ok(spec)
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Create or fully replace a job and its trigger.
pub async fn create_job<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Json(request): Json<JobRequest>,
) -> Result<Json<TriggerInfo>, ApiError> {
    let spec = request.into_spec()?;
    let description = spec.description.clone();
    let job_type = spec.job_type.clone();
    let data = spec.data.clone();

    let trigger = state.handle.schedule_job(spec).await?;
    Ok(Json(TriggerInfo::from_trigger(
        &trigger,
        &description,
        &job_type,
        &data,
        state.timezone,
    )))
}

/// List all jobs with their schedule state.
pub async fn list_jobs<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<Vec<TriggerInfo>>, ApiError> {
    let jobs = state.handle.list_jobs().await?;
    let infos = jobs
        .iter()
        .map(|(job, trigger)| {
            TriggerInfo::from_trigger(
                trigger,
                &job.description,
                &job.job_type,
                &job.data,
                state.timezone,
            )
        })
        .collect();
    Ok(Json(infos))
}

/// List distinct job group names.
pub async fn list_groups<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.handle.list_groups().await?))
}

/// Delete a job and its trigger.
pub async fn delete_job<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.handle.delete_job(JobKey::new(name, group)).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Recent execution history for a job, most recent first.
pub async fn job_history<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Json<Vec<ExecutionLogResponse>>, ApiError> {
    let key = JobKey::new(name, group);
    let entries = state.storage.list_logs(&key, HISTORY_LIMIT).await?;
    let responses = entries
        .iter()
        .map(|entry| ExecutionLogResponse::from_entry(entry, state.timezone))
        .collect();
    Ok(Json(responses))
}
