//! Repository for the `jobs` table.
//!
//! Every status transition passes through here. Multiple workers are
//! safe because claiming is a single atomic UPDATE with
//! `FOR UPDATE SKIP LOCKED` -- the job row is the only lock, and it is
//! held for the duration of the claim statement, never across
//! execution.

use sqlx::PgPool;

use conveyor_core::error::CoreError;
use conveyor_core::ids::new_job_id;
use conveyor_core::queue::{progress_in_range, PROGRESS_MAX, PROGRESS_MIN};
use conveyor_core::status::JobStatus;
use conveyor_core::types::{UploadId, UserId};

use crate::error::StoreResult;
use crate::models::job::Job;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, user_id, upload_id, status, progress, claimed_by, reclaim_count, \
    created_at, started_at, finished_at, error_message, input_path, result_path";

/// Whether a transition guard failed because the staleness sweep took
/// the job back while its worker was still running it. Such a job sits
/// `pending` again with a bumped `reclaim_count`.
fn claim_went_stale(job: &Job) -> bool {
    job.status == JobStatus::Pending && job.was_reclaimed()
}

/// Provides all lifecycle operations for background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job for an upload. `progress` starts at 0.
    pub async fn create(
        pool: &PgPool,
        user_id: UserId,
        upload_id: UploadId,
        input_path: &str,
    ) -> StoreResult<Job> {
        let query = format!(
            "INSERT INTO jobs (id, user_id, upload_id, status, progress, input_path) \
             VALUES ($1, $2, $3, $4, 0, $5) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(new_job_id())
            .bind(user_id)
            .bind(upload_id)
            .bind(JobStatus::Pending.as_str())
            .bind(input_path)
            .fetch_one(pool)
            .await?;
        Ok(job)
    }

    /// Atomically claim the oldest pending job for a worker.
    ///
    /// The inner select locks one pending row; concurrent claimers skip
    /// locked rows and take the next pending job or nothing, so a job is
    /// handed to at most one caller. `None` means the queue is empty,
    /// which is the normal idle condition, not an error.
    pub async fn claim_next(pool: &PgPool, worker_id: &str) -> StoreResult<Option<Job>> {
        let query = format!(
            "UPDATE jobs \
             SET status = $1, started_at = NOW(), claimed_by = $2 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status = $3 \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Running.as_str())
            .bind(worker_id)
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// Record progress for a running job.
    ///
    /// Progress must stay within 0..=100 and never decrease. The guards
    /// live in the UPDATE itself so racing reporters cannot interleave
    /// a decrease past a read-then-write check. Zero rows updated means
    /// a guard failed; the job is re-read to report which one.
    pub async fn update_progress(pool: &PgPool, job_id: &str, progress: i32) -> StoreResult<Job> {
        if !progress_in_range(progress) {
            let job = Self::get(pool, job_id).await?;
            return Err(CoreError::InvalidTransition {
                job_id: job_id.to_string(),
                status: job.status,
                detail: format!(
                    "progress {progress} outside {PROGRESS_MIN}..={PROGRESS_MAX}"
                ),
            }
            .into());
        }

        let query = format!(
            "UPDATE jobs \
             SET progress = $2 \
             WHERE id = $1 AND status = $3 AND progress <= $2 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(progress)
            .bind(JobStatus::Running.as_str())
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(job) => Ok(job),
            None => {
                let job = Self::get(pool, job_id).await?;
                if claim_went_stale(&job) {
                    return Err(CoreError::StaleClaim {
                        job_id: job_id.to_string(),
                    }
                    .into());
                }
                let detail = if job.status != JobStatus::Running {
                    "progress can only be reported while running".to_string()
                } else {
                    format!("progress cannot decrease ({} -> {progress})", job.progress)
                };
                Err(CoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    status: job.status,
                    detail,
                }
                .into())
            }
        }
    }

    /// Transition a running job to `done`.
    ///
    /// Sets `finished_at`, forces `progress` to 100, and records the
    /// result artifact path. Terminal: no further transition succeeds.
    pub async fn complete(pool: &PgPool, job_id: &str, result_path: &str) -> StoreResult<Job> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, finished_at = NOW(), progress = 100, result_path = $3 \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(JobStatus::Done.as_str())
            .bind(result_path)
            .bind(JobStatus::Running.as_str())
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(job) => Ok(job),
            None => {
                let job = Self::get(pool, job_id).await?;
                if claim_went_stale(&job) {
                    return Err(CoreError::StaleClaim {
                        job_id: job_id.to_string(),
                    }
                    .into());
                }
                Err(CoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    status: job.status,
                    detail: "only a running job can complete".to_string(),
                }
                .into())
            }
        }
    }

    /// Transition a running job to `failed`, recording the error.
    ///
    /// Idempotent against double-failure: a second `fail` on an
    /// already-failed job returns the stored row unchanged, so an
    /// executor may retry its failure report after a transient store
    /// error without tripping the transition guard.
    pub async fn fail(pool: &PgPool, job_id: &str, error_message: &str) -> StoreResult<Job> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, finished_at = NOW(), error_message = $3 \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(JobStatus::Failed.as_str())
            .bind(error_message)
            .bind(JobStatus::Running.as_str())
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(job) => Ok(job),
            None => {
                let job = Self::get(pool, job_id).await?;
                if job.status == JobStatus::Failed {
                    return Ok(job);
                }
                if claim_went_stale(&job) {
                    return Err(CoreError::StaleClaim {
                        job_id: job_id.to_string(),
                    }
                    .into());
                }
                Err(CoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    status: job.status,
                    detail: "only a running job can fail".to_string(),
                }
                .into())
            }
        }
    }

    /// Fetch a job by id.
    pub async fn get(pool: &PgPool, job_id: &str) -> StoreResult<Job> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await?;
        job.ok_or_else(|| {
            CoreError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            }
            .into()
        })
    }

    /// Return jobs stuck in `running` past `max_running_age` to the
    /// pending queue. Returns how many were reclaimed.
    ///
    /// A worker that dies mid-job leaves its row `running` forever;
    /// this sweep makes such jobs claimable again. `started_at` and
    /// `claimed_by` are cleared and `progress` resets to 0 for the next
    /// attempt; `reclaim_count` is bumped so reclaimed jobs stay
    /// distinguishable from fresh ones.
    pub async fn reclaim_stale(
        pool: &PgPool,
        max_running_age: chrono::Duration,
    ) -> StoreResult<u64> {
        let cutoff = chrono::Utc::now() - max_running_age;
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = $1, started_at = NULL, claimed_by = NULL, \
                 progress = 0, reclaim_count = reclaim_count + 1 \
             WHERE status = $2 AND started_at < $3",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Running.as_str())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// 1-based position of a job among pending jobs in claim order.
    pub async fn queue_position(pool: &PgPool, job_id: &str) -> StoreResult<i64> {
        let job = Self::get(pool, job_id).await?;
        let (ahead,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = $1 AND created_at < $2")
                .bind(JobStatus::Pending.as_str())
                .bind(job.created_at)
                .fetch_one(pool)
                .await?;
        Ok(ahead + 1)
    }

    /// Number of jobs waiting to be claimed.
    pub async fn count_pending(pool: &PgPool) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(JobStatus::Pending.as_str())
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// List a user's jobs, newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: UserId) -> StoreResult<Vec<Job>> {
        let query =
            format!("SELECT {COLUMNS} FROM jobs WHERE user_id = $1 ORDER BY created_at DESC");
        let jobs = sqlx::query_as::<_, Job>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(jobs)
    }
}
