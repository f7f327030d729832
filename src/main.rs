//! chime - a cron-driven job scheduler with execution history.
//!
//! Usage:
//!   chime run [--config <file>]   Run the scheduler and API server
//!   chime check <file>            Validate a configuration file

use chime::api::{create_api_state, start_server, ApiConfig};
use chime::{
    Config, HttpJobExecutor, InMemoryStorage, JobExecutor, RetentionCleaner, Scheduler, Storage,
    StorageConfig, JOB_TYPE_HTTP,
};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// chime - a cron-driven job scheduler with execution history
#[derive(Parser)]
#[command(name = "chime")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and API server
    Run {
        /// Path to the YAML configuration file
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file without running
    Check {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = match config {
                Some(path) => {
                    info!("loading configuration from {}", path.display());
                    Config::load(path)?
                }
                None => {
                    info!("no configuration file given, using defaults");
                    Config::default()
                }
            };
            run(config).await
        }
        Commands::Check { config } => {
            Config::load(&config)?;
            info!("configuration OK: {}", config.display());
            Ok(())
        }
    }
}

/// Run the scheduler with the configured storage backend.
async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match config.storage.clone() {
        StorageConfig::Memory => {
            warn!("using in-memory storage; jobs will not survive a restart");
            serve(Arc::new(InMemoryStorage::new()), config).await
        }
        StorageConfig::Sqlite { path } => {
            #[cfg(feature = "sqlite")]
            {
                info!("opening SQLite database at {}", path);
                let storage = chime::SqliteStorage::new(&path).await?;
                serve(Arc::new(storage), config).await
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = path;
                Err("sqlite storage selected but this build lacks the 'sqlite' feature".into())
            }
        }
    }
}

/// Wire up the scheduler, retention cleaner, and API server, then run until
/// interrupted.
async fn serve<S: Storage + 'static>(
    storage: Arc<S>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut executors: HashMap<String, Arc<dyn JobExecutor>> = HashMap::new();
    executors.insert(
        JOB_TYPE_HTTP.to_string(),
        Arc::new(HttpJobExecutor::new(config.http_job.executor_config())),
    );

    let options = config.scheduler.options();
    let timezone = options.timezone.clone();
    let (handle, scheduler_task) =
        Scheduler::start(Arc::clone(&storage), executors, options).await?;

    let _cleaner_task =
        RetentionCleaner::new(Arc::clone(&storage), config.history.retention_days).spawn();

    let state = create_api_state(handle.clone(), storage, &timezone);
    let api_config = ApiConfig::new(config.server.host.clone(), config.server.port);
    let (_addr, _api_task) = start_server(api_config, state).await?;

    info!("Press Ctrl+C to stop");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down...");
            handle.shutdown().await?;
        }
        _ = scheduler_task => {
            info!("scheduler stopped");
        }
    }

    info!("Goodbye!");
    Ok(())
}
