//! Job entity model for the background processing queue.

use serde::Serialize;
use sqlx::FromRow;

use conveyor_core::status::JobStatus;
use conveyor_core::types::{Timestamp, UploadId, UserId};

/// A row from the `jobs` table.
///
/// Worker ownership is encoded in the row itself: a job with
/// `status = running` belongs to the worker named in `claimed_by`, and
/// there is no separate lock record.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    /// Short fixed-length hex id (see `conveyor_core::ids`).
    pub id: String,
    pub user_id: UserId,
    pub upload_id: UploadId,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// Percent complete, 0..=100, monotone while running.
    pub progress: i32,
    /// Claim identity of the worker that owns (or last owned) this job.
    pub claimed_by: Option<String>,
    /// Times this job was returned to the queue by the staleness sweep.
    pub reclaim_count: i32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub input_path: String,
    pub result_path: Option<String>,
}

impl Job {
    /// Whether this job was ever reclaimed from a crashed worker.
    ///
    /// Distinguishes a stale-reclaimed retry from a first attempt when
    /// diagnosing repeated failures.
    pub fn was_reclaimed(&self) -> bool {
        self.reclaim_count > 0
    }
}
