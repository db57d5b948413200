//! The claim -> execute -> report loop.
//!
//! Any number of identical worker processes run this loop against the
//! same database. They share no in-process state; the claim UPDATE in
//! `JobRepo::claim_next` is the only coordination.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;

use conveyor_db::models::job::Job;
use conveyor_db::repositories::JobRepo;

use crate::executor::{JobExecutor, ProgressReporter};

/// Worker loop settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity recorded into `claimed_by` on every claim.
    pub worker_id: String,
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
}

/// Run the worker loop until `shutdown` flips to true.
///
/// One job per iteration. Executor failures are captured into the job
/// row and never propagate: one bad job must not kill the process.
pub async fn run(
    pool: &PgPool,
    config: &WorkerConfig,
    executor: &dyn JobExecutor,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(worker_id = %config.worker_id, "Worker loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match JobRepo::claim_next(pool, &config.worker_id).await {
            Ok(Some(job)) => process_job(pool, executor, &job).await,
            Ok(None) => {
                // Empty queue: idle until the next poll or shutdown.
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Claim failed, retrying after poll interval");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
    tracing::info!(worker_id = %config.worker_id, "Worker loop stopped");
}

/// Execute one claimed job and report the outcome to the store.
///
/// Store failures during the report step are logged and swallowed; the
/// staleness sweep will eventually return such a job to the queue.
pub async fn process_job(pool: &PgPool, executor: &dyn JobExecutor, job: &Job) {
    tracing::info!(job_id = %job.id, upload_id = %job.upload_id, "Processing job");
    let progress = ProgressReporter::new(pool, &job.id);
    match executor.execute(job, &progress).await {
        Ok(result_path) => match JobRepo::complete(pool, &job.id, &result_path).await {
            Ok(_) => {
                tracing::info!(job_id = %job.id, result_path = %result_path, "Job finished");
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Could not mark job done");
            }
        },
        Err(e) => {
            // {:#} renders the whole anyhow context chain.
            let message = format!("{e:#}");
            tracing::error!(job_id = %job.id, error = %message, "Job failed");
            if let Err(store_err) = JobRepo::fail(pool, &job.id, &message).await {
                tracing::error!(
                    job_id = %job.id,
                    error = %store_err,
                    "Could not mark job failed",
                );
            }
        }
    }
}
