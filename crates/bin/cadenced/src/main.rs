//! # cadenced: cadence daemon
//!
//! Composition root that wires all adapters together and runs the scheduler.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Build the trigger registry with the job repository and SQL adapters
//! - Open the configured automation repository
//! - Poll, evaluate and submit jobs until SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use cadence_adapter_storage_fs::{DirectoryAutomationRepository, JsonFileAutomationRepository};
use cadence_adapter_storage_sqlite_sqlx::{
    Database, SqliteConnector, SqliteJobRepository, SqliteScalarStore,
};
use cadence_app::automation_executor::AutomationExecutor;
use cadence_app::ports::AutomationRepository;
use cadence_app::scheduler::Scheduler;
use cadence_app::triggers::{TriggerRegistry, TriggerServices};

use crate::config::{Config, StorageKind};

type Executor = AutomationExecutor<SqliteScalarStore>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let database = cadence_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database.url.clone(),
    }
    .build()
    .await?;

    // Triggers
    let registry = TriggerRegistry::builtin(TriggerServices {
        job_repositories: SqliteJobRepository::providers(database.clone()),
        sql_connector: Some(Arc::new(SqliteConnector::new(database.clone()))),
    });
    tracing::info!(kinds = ?registry.get_ids(), "trigger kinds registered");

    let executor = AutomationExecutor::new(
        Arc::new(registry),
        SqliteScalarStore::new(database.pool().clone()),
    )
    .with_root_group(config.scheduler.root_group.as_str());

    let path = config.storage.path.clone();
    let poll_interval = config.poll_interval();
    match config.storage.kind {
        StorageKind::Directory => {
            let repo = DirectoryAutomationRepository::new(path);
            serve(repo, executor, &database, poll_interval).await?;
        }
        StorageKind::File => {
            let repo = JsonFileAutomationRepository::new(path);
            serve(repo, executor, &database, poll_interval).await?;
        }
    }
    Ok(())
}

async fn serve<R: AutomationRepository>(
    repo: R,
    executor: Executor,
    database: &Database,
    poll_interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = repo.get_version_timestamp().await?;
    tracing::info!(
        automations = repo.count().await?,
        %version,
        "automation repository opened"
    );

    let submitter = SqliteJobRepository::new(database.pool().clone());
    let scheduler =
        Scheduler::new(repo, executor, submitter).with_poll_interval(poll_interval);
    scheduler.run(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(err) => tracing::error!(error = %err, "unable to listen for shutdown signal"),
    }
}
