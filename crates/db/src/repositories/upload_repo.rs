//! Repository for the `uploads` table.
//!
//! The single-master-per-user rule is carried by the partial unique
//! index `uq_uploads_master_per_user`, not by application logic, so it
//! holds under concurrent writers.

use sqlx::PgPool;

use conveyor_core::error::CoreError;
use conveyor_core::status::UploadStatus;
use conveyor_core::types::{UploadId, UserId};

use crate::error::StoreResult;
use crate::models::upload::Upload;

/// Column list for `uploads` queries.
const COLUMNS: &str = "\
    id, user_id, filename, status, archive_sha256, is_master, created_at, processed_at";

/// Provides CRUD operations and master promotion for uploads.
pub struct UploadRepo;

impl UploadRepo {
    /// Register a new upload. Never created as master; promotion is a
    /// separate explicit step.
    pub async fn create(
        pool: &PgPool,
        user_id: UserId,
        filename: &str,
        archive_sha256: Option<&str>,
    ) -> StoreResult<Upload> {
        let query = format!(
            "INSERT INTO uploads (user_id, filename, status, archive_sha256) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let upload = sqlx::query_as::<_, Upload>(&query)
            .bind(user_id)
            .bind(filename)
            .bind(UploadStatus::Uploaded.as_str())
            .bind(archive_sha256)
            .fetch_one(pool)
            .await?;
        Ok(upload)
    }

    /// Promote an upload to its user's master, demoting any previous
    /// master in the same transaction.
    ///
    /// A concurrent promotion that commits between our demote and
    /// promote is rejected by the partial unique index (23505) and
    /// surfaces as `Conflict`; the caller retries or aborts, and the
    /// last successful promotion stands.
    pub async fn promote_to_master(
        pool: &PgPool,
        upload_id: UploadId,
        user_id: UserId,
    ) -> StoreResult<Upload> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE uploads SET is_master = FALSE \
             WHERE user_id = $1 AND is_master AND id <> $2",
        )
        .bind(user_id)
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE uploads SET is_master = TRUE \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        let promoted = sqlx::query_as::<_, Upload>(&query)
            .bind(upload_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let upload = promoted.ok_or(CoreError::NotFound {
            entity: "upload",
            id: upload_id.to_string(),
        })?;

        tx.commit().await?;
        Ok(upload)
    }

    /// The user's current master upload, if any.
    pub async fn master_for_user(pool: &PgPool, user_id: UserId) -> StoreResult<Option<Upload>> {
        let query = format!("SELECT {COLUMNS} FROM uploads WHERE user_id = $1 AND is_master");
        let upload = sqlx::query_as::<_, Upload>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(upload)
    }

    /// Fetch an upload by id.
    pub async fn get(pool: &PgPool, upload_id: UploadId) -> StoreResult<Upload> {
        let query = format!("SELECT {COLUMNS} FROM uploads WHERE id = $1");
        let upload = sqlx::query_as::<_, Upload>(&query)
            .bind(upload_id)
            .fetch_optional(pool)
            .await?;
        upload.ok_or_else(|| {
            CoreError::NotFound {
                entity: "upload",
                id: upload_id.to_string(),
            }
            .into()
        })
    }

    /// List a user's uploads, newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: UserId) -> StoreResult<Vec<Upload>> {
        let query =
            format!("SELECT {COLUMNS} FROM uploads WHERE user_id = $1 ORDER BY created_at DESC");
        let uploads = sqlx::query_as::<_, Upload>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(uploads)
    }

    /// Mark an upload processed, keeping the first `processed_at`.
    pub async fn mark_processed(pool: &PgPool, upload_id: UploadId) -> StoreResult<Upload> {
        let query = format!(
            "UPDATE uploads \
             SET status = $2, processed_at = COALESCE(processed_at, NOW()) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Upload>(&query)
            .bind(upload_id)
            .bind(UploadStatus::Processed.as_str())
            .fetch_optional(pool)
            .await?;
        updated.ok_or_else(|| {
            CoreError::NotFound {
                entity: "upload",
                id: upload_id.to_string(),
            }
            .into()
        })
    }

    /// Most recent upload matching a user's archive hash, for
    /// duplicate-upload detection.
    pub async fn find_by_hash(
        pool: &PgPool,
        user_id: UserId,
        archive_sha256: &str,
    ) -> StoreResult<Option<Upload>> {
        let query = format!(
            "SELECT {COLUMNS} FROM uploads \
             WHERE user_id = $1 AND archive_sha256 = $2 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        let upload = sqlx::query_as::<_, Upload>(&query)
            .bind(user_id)
            .bind(archive_sha256)
            .fetch_optional(pool)
            .await?;
        Ok(upload)
    }
}
