//! Upload entity model.

use serde::Serialize;
use sqlx::FromRow;

use conveyor_core::status::UploadStatus;
use conveyor_core::types::{Timestamp, UploadId, UserId};

/// A row from the `uploads` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Upload {
    pub id: UploadId,
    pub user_id: UserId,
    pub filename: String,
    #[sqlx(try_from = "String")]
    pub status: UploadStatus,
    /// SHA-256 of the uploaded archive, used for duplicate detection.
    pub archive_sha256: Option<String>,
    /// At most one upload per user carries this flag; enforced by the
    /// partial unique index `uq_uploads_master_per_user`.
    pub is_master: bool,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}
