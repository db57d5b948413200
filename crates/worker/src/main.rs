//! `conveyor-worker` -- stateless queue worker process.
//!
//! Claims pending jobs from PostgreSQL and runs them through the
//! archive pipeline. Any number of identical processes may run against
//! the same database; claiming is atomic, so no job is processed by
//! more than one worker. Each process also runs the staleness sweep
//! that returns jobs abandoned by crashed workers to the queue.
//!
//! # Environment variables
//!
//! | Variable              | Required | Default                   | Description                                |
//! |-----------------------|----------|---------------------------|--------------------------------------------|
//! | `DATABASE_URL`        | yes      | --                        | PostgreSQL connection string               |
//! | `WORKER_ID`           | no       | `<hostname>:<pid>`        | Claim identity recorded into `claimed_by`  |
//! | `POLL_INTERVAL_SECS`  | no       | `2`                       | Sleep between claim polls when idle        |
//! | `SWEEP_INTERVAL_SECS` | no       | `60`                      | Time between staleness sweeps              |
//! | `STALE_AFTER_SECS`    | no       | `1800`                    | Running age before a job is reclaimed      |
//! | `MAX_DB_CONNECTIONS`  | no       | `5`                       | Pool size                                  |
//! | `WORK_DIR`            | no       | `/tmp/conveyor/work`      | Per-job scratch directories                |
//! | `RESULTS_DIR`         | no       | `/tmp/conveyor/results`   | Result artifact root                       |

use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conveyor_core::queue::{
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_STALE_AFTER_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
};
use conveyor_worker::pipeline::ArchiveExecutor;
use conveyor_worker::run::{self, WorkerConfig};
use conveyor_worker::sweep::{self, SweepConfig};

/// Default pool size; one claim plus a handful of progress writers.
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor_worker=info,conveyor_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::error!("DATABASE_URL environment variable is required");
        std::process::exit(1);
    });

    let worker_id = std::env::var("WORKER_ID").unwrap_or_else(|_| default_worker_id());
    let poll_interval = Duration::from_secs(env_u64("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS));
    let sweep_interval = Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS));
    let stale_after = chrono::Duration::seconds(env_u64("STALE_AFTER_SECS", DEFAULT_STALE_AFTER_SECS) as i64);
    let max_connections = env_u64("MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS as u64) as u32;
    let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/tmp/conveyor/work".to_string());
    let results_dir =
        std::env::var("RESULTS_DIR").unwrap_or_else(|_| "/tmp/conveyor/results".to_string());

    let pool = conveyor_db::connect(&database_url, max_connections)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Could not connect to PostgreSQL");
            std::process::exit(1);
        });

    if let Err(e) = conveyor_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }

    tracing::info!(
        worker_id = %worker_id,
        poll_interval_secs = poll_interval.as_secs(),
        "Starting conveyor-worker",
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_pool = pool.clone();
    let sweep_config = SweepConfig {
        interval: sweep_interval,
        stale_after,
    };
    let sweep_shutdown = shutdown_rx.clone();
    let sweep_handle =
        tokio::spawn(async move { sweep::run(&sweep_pool, &sweep_config, sweep_shutdown).await });

    let executor = ArchiveExecutor::new(work_dir, results_dir);
    let config = WorkerConfig {
        worker_id,
        poll_interval,
    };

    tokio::select! {
        _ = run::run(&pool, &config, &executor, shutdown_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = sweep_handle.await;
}

/// Default claim identity: `<hostname>:<pid>`, distinct across the N
/// identical processes a process manager starts on one host.
fn default_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string());
    format!("{host}:{}", std::process::id())
}

/// Read an integer environment variable, falling back on the default
/// when unset or unparsable.
fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
