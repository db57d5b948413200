//! The executor seam between queue plumbing and processing logic.

use async_trait::async_trait;
use sqlx::PgPool;

use conveyor_db::models::job::Job;
use conveyor_db::repositories::JobRepo;

/// Executes the processing behind a claimed job.
///
/// Implementations return the result artifact path on success. Any
/// error aborts the job: the worker loop captures the message into
/// `error_message` and keeps polling, so queue code stays independent
/// of what processing actually does.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &Job, progress: &ProgressReporter<'_>) -> anyhow::Result<String>;
}

/// Forwards executor progress reports to the job store.
///
/// Progress writes are advisory: a failed write is logged and dropped
/// rather than aborting the job.
pub struct ProgressReporter<'a> {
    pool: &'a PgPool,
    job_id: &'a str,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(pool: &'a PgPool, job_id: &'a str) -> Self {
        Self { pool, job_id }
    }

    /// Report percent complete for the running job.
    pub async fn report(&self, percent: i32) {
        if let Err(e) = JobRepo::update_progress(self.pool, self.job_id, percent).await {
            tracing::warn!(
                job_id = %self.job_id,
                percent,
                error = %e,
                "Dropped progress update",
            );
        }
    }
}
