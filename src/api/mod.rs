//! HTTP API for managing jobs and reading execution history.
//!
//! All endpoints live under `/api`. Job mutations go through the scheduler
//! handle so the scheduler task stays the single authority over trigger
//! state; history reads go straight to storage.

mod errors;
mod handlers;
mod responses;

pub use errors::ApiError;
pub use handlers::ApiState;
pub use responses::{ExecutionLogResponse, HealthResponse, TriggerInfo};

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::scheduler::SchedulerHandle;
use crate::storage::Storage;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Build the API router with all endpoints.
pub fn build_router<S: Storage + 'static>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        // Jobs
        .route("/api/jobs", post(handlers::create_job::<S>))
        .route("/api/jobs", get(handlers::list_jobs::<S>))
        .route("/api/jobs/groups", get(handlers::list_groups::<S>))
        .route(
            "/api/jobs/{group}/{name}",
            delete(handlers::delete_job::<S>),
        )
        // Execution history
        .route(
            "/api/history/{group}/{name}",
            get(handlers::job_history::<S>),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Create the API state from scheduler components.
///
/// `timezone` is the zone execution times are rendered in; it falls back to
/// UTC if the name is unknown.
pub fn create_api_state<S: Storage>(
    handle: SchedulerHandle,
    storage: Arc<S>,
    timezone: &str,
) -> ApiState<S> {
    let timezone: Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
    ApiState {
        handle,
        storage,
        timezone,
    }
}

/// Start the API server.
///
/// Binds immediately and returns the bound address along with the serving
/// task's handle. The server runs until the task is aborted or the process
/// exits.
pub async fn start_server<S: Storage + 'static>(
    config: ApiConfig,
    state: ApiState<S>,
) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = build_router(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!("API server listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok((addr, handle))
}
