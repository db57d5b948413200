//! Default executor: stages an uploaded archive and produces the
//! dashboard result artifact.
//!
//! The report computation itself lives outside this crate. What this
//! executor owns is the filesystem contract: read the job's
//! `input_path`, work under a per-job scratch directory, and leave a
//! `dashboard.json` whose path becomes the job's `result_path`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use conveyor_db::models::job::Job;

use crate::executor::{JobExecutor, ProgressReporter};

/// Progress milestone after the input archive is staged.
const PROGRESS_STAGED: i32 = 10;

/// Progress milestone after the result artifact is written.
const PROGRESS_ARTIFACT_WRITTEN: i32 = 90;

/// Processes upload archives into result artifacts on local disk.
pub struct ArchiveExecutor {
    /// Per-job scratch directories live under here; removed after the
    /// job, whatever its outcome.
    work_root: PathBuf,
    /// Result artifacts live under `<results_root>/<job_id>/`.
    results_root: PathBuf,
}

impl ArchiveExecutor {
    pub fn new(work_root: impl Into<PathBuf>, results_root: impl Into<PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
            results_root: results_root.into(),
        }
    }

    async fn cleanup(&self, work_dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
            tracing::warn!(path = %work_dir.display(), error = %e, "Scratch cleanup failed");
        }
    }

    async fn stage_and_process(
        &self,
        job: &Job,
        work_dir: &Path,
        progress: &ProgressReporter<'_>,
    ) -> anyhow::Result<String> {
        let raw = tokio::fs::read(&job.input_path)
            .await
            .with_context(|| format!("input file missing at {}", job.input_path))?;

        tokio::fs::create_dir_all(work_dir)
            .await
            .with_context(|| format!("could not create scratch dir {}", work_dir.display()))?;
        let staged = work_dir.join("input.zip");
        tokio::fs::write(&staged, &raw)
            .await
            .with_context(|| format!("could not stage input at {}", staged.display()))?;
        progress.report(PROGRESS_STAGED).await;

        let out_dir = self.results_root.join(&job.id);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .with_context(|| format!("could not create result dir {}", out_dir.display()))?;

        let summary = serde_json::json!({
            "job_id": job.id,
            "upload_id": job.upload_id,
            "user_id": job.user_id,
            "input_bytes": raw.len(),
            "generated_at": chrono::Utc::now(),
        });
        let result_path = out_dir.join("dashboard.json");
        tokio::fs::write(&result_path, serde_json::to_vec_pretty(&summary)?)
            .await
            .with_context(|| format!("could not write {}", result_path.display()))?;
        progress.report(PROGRESS_ARTIFACT_WRITTEN).await;

        Ok(result_path.to_string_lossy().into_owned())
    }
}

#[async_trait]
impl JobExecutor for ArchiveExecutor {
    async fn execute(&self, job: &Job, progress: &ProgressReporter<'_>) -> anyhow::Result<String> {
        let work_dir = self.work_root.join(&job.id);
        let outcome = self.stage_and_process(job, &work_dir, progress).await;
        self.cleanup(&work_dir).await;
        outcome
    }
}
