//! Staleness sweep: returns jobs abandoned by crashed workers to the
//! pending queue.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;

use conveyor_db::repositories::JobRepo;

/// Sweep settings.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often to scan for stale jobs.
    pub interval: Duration,
    /// Age past which a `running` job is treated as abandoned. Must
    /// exceed the longest legitimate job duration, or live jobs get
    /// reclaimed out from under their workers.
    pub stale_after: chrono::Duration,
}

/// Run the staleness sweep until `shutdown` flips to true.
///
/// Every worker process runs one of these; that is safe because the
/// reclaim is a single conditional UPDATE, so concurrent sweeps cannot
/// double-reclaim a job.
pub async fn run(pool: &PgPool, config: &SweepConfig, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        stale_after_secs = config.stale_after.num_seconds(),
        "Staleness sweep started",
    );
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }
        match JobRepo::reclaim_stale(pool, config.stale_after).await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "Returned stale jobs to the queue"),
            Err(e) => tracing::error!(error = %e, "Stale-job sweep failed"),
        }
    }
    tracing::info!("Staleness sweep stopped");
}
