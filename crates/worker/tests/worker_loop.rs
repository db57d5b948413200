//! Worker-loop behaviour against a real pool: outcome reporting, crash
//! isolation, and the full claim -> execute -> report cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use conveyor_core::status::JobStatus;
use conveyor_db::models::job::Job;
use conveyor_db::models::upload::Upload;
use conveyor_db::repositories::{JobRepo, UploadRepo};
use conveyor_worker::executor::{JobExecutor, ProgressReporter};
use conveyor_worker::pipeline::ArchiveExecutor;
use conveyor_worker::run::{self, WorkerConfig};
use conveyor_worker::sweep::{self, SweepConfig};

async fn seed_job(pool: &PgPool, input_path: &str) -> (Upload, Job) {
    let upload = UploadRepo::create(pool, Uuid::new_v4(), "hands.zip", None)
        .await
        .unwrap();
    let job = JobRepo::create(pool, upload.user_id, upload.id, input_path)
        .await
        .unwrap();
    (upload, job)
}

/// Reports a couple of milestones, then succeeds.
struct OkExecutor;

#[async_trait]
impl JobExecutor for OkExecutor {
    async fn execute(&self, job: &Job, progress: &ProgressReporter<'_>) -> anyhow::Result<String> {
        progress.report(25).await;
        progress.report(75).await;
        Ok(format!("results/{}/dashboard.json", job.id))
    }
}

/// Always fails with a deterministic message.
struct FailingExecutor;

#[async_trait]
impl JobExecutor for FailingExecutor {
    async fn execute(&self, _job: &Job, _progress: &ProgressReporter<'_>) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("input archive is corrupt"))
    }
}

/// Fails on the first call, succeeds afterwards. Tracks invocations.
struct FlakyExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl JobExecutor for FlakyExecutor {
    async fn execute(&self, job: &Job, _progress: &ProgressReporter<'_>) -> anyhow::Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("transient pipeline fault");
        }
        Ok(format!("results/{}/dashboard.json", job.id))
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn successful_job_ends_done_with_result_path(pool: PgPool) {
    let (_, job) = seed_job(&pool, "/in.zip").await;
    let claimed = JobRepo::claim_next(&pool, "w1").await.unwrap().unwrap();

    run::process_job(&pool, &OkExecutor, &claimed).await;

    let finished = JobRepo::get(&pool, &job.id).await.unwrap();
    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.progress, 100);
    assert_eq!(
        finished.result_path.as_deref(),
        Some(format!("results/{}/dashboard.json", job.id).as_str())
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn executor_failure_is_captured_not_propagated(pool: PgPool) {
    let (_, job) = seed_job(&pool, "/in.zip").await;
    let claimed = JobRepo::claim_next(&pool, "w1").await.unwrap().unwrap();

    run::process_job(&pool, &FailingExecutor, &claimed).await;

    let failed = JobRepo::get(&pool, &job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.finished_at.is_some());
    assert_eq!(
        failed.error_message.as_deref(),
        Some("input archive is corrupt")
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn one_bad_job_does_not_poison_the_next(pool: PgPool) {
    let (_, bad) = seed_job(&pool, "/bad.zip").await;
    let (_, good) = seed_job(&pool, "/good.zip").await;

    let executor = FlakyExecutor {
        calls: AtomicUsize::new(0),
    };
    for _ in 0..2 {
        let claimed = JobRepo::claim_next(&pool, "w1").await.unwrap().unwrap();
        run::process_job(&pool, &executor, &claimed).await;
    }

    assert_eq!(JobRepo::get(&pool, &bad.id).await.unwrap().status, JobStatus::Failed);
    assert_eq!(JobRepo::get(&pool, &good.id).await.unwrap().status, JobStatus::Done);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn run_loop_drains_the_queue_and_stops_on_shutdown(pool: PgPool) {
    let (_, first) = seed_job(&pool, "/a.zip").await;
    let (_, second) = seed_job(&pool, "/b.zip").await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = WorkerConfig {
        worker_id: "test-worker".to_string(),
        poll_interval: Duration::from_millis(20),
    };
    let loop_pool = pool.clone();
    let handle = tokio::spawn(async move {
        run::run(&loop_pool, &config, &OkExecutor, shutdown_rx).await;
    });

    // Wait for both jobs to reach a terminal state.
    for job_id in [&first.id, &second.id] {
        let mut done = false;
        for _ in 0..100 {
            if JobRepo::get(&pool, job_id).await.unwrap().status == JobStatus::Done {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(done, "job {job_id} never finished");
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker loop did not stop on shutdown")
        .unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sweep_task_requeues_abandoned_jobs(pool: PgPool) {
    let (_, job) = seed_job(&pool, "/in.zip").await;
    JobRepo::claim_next(&pool, "dead-worker").await.unwrap().unwrap();
    sqlx::query("UPDATE jobs SET started_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(&job.id)
        .execute(&pool)
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = SweepConfig {
        interval: Duration::from_millis(20),
        stale_after: chrono::Duration::hours(1),
    };
    let sweep_pool = pool.clone();
    let handle = tokio::spawn(async move {
        sweep::run(&sweep_pool, &config, shutdown_rx).await;
    });

    let mut requeued = false;
    for _ in 0..100 {
        if JobRepo::get(&pool, &job.id).await.unwrap().status == JobStatus::Pending {
            requeued = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(requeued, "stale job was never returned to the queue");
    assert_eq!(JobRepo::get(&pool, &job.id).await.unwrap().reclaim_count, 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("sweep did not stop on shutdown")
        .unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn archive_executor_stages_input_and_writes_dashboard(pool: PgPool) {
    let scratch = tempfile::tempdir().unwrap();
    let input = scratch.path().join("upload.zip");
    tokio::fs::write(&input, b"fake archive bytes").await.unwrap();

    let (_, job) = seed_job(&pool, input.to_str().unwrap()).await;
    let claimed = JobRepo::claim_next(&pool, "w1").await.unwrap().unwrap();

    let executor = ArchiveExecutor::new(
        scratch.path().join("work"),
        scratch.path().join("results"),
    );
    run::process_job(&pool, &executor, &claimed).await;

    let finished = JobRepo::get(&pool, &job.id).await.unwrap();
    assert_eq!(finished.status, JobStatus::Done);

    let result_path = finished.result_path.unwrap();
    let body = tokio::fs::read_to_string(&result_path).await.unwrap();
    let summary: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["job_id"], job.id.as_str());
    assert_eq!(summary["input_bytes"], 18);

    // Scratch directory is removed after the job.
    assert!(!scratch.path().join("work").join(&job.id).exists());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn archive_executor_fails_cleanly_on_missing_input(pool: PgPool) {
    let scratch = tempfile::tempdir().unwrap();
    let (_, job) = seed_job(&pool, "/nonexistent/input.zip").await;
    let claimed = JobRepo::claim_next(&pool, "w1").await.unwrap().unwrap();

    let executor = ArchiveExecutor::new(
        scratch.path().join("work"),
        scratch.path().join("results"),
    );
    run::process_job(&pool, &executor, &claimed).await;

    let failed = JobRepo::get(&pool, &job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    let message = failed.error_message.unwrap();
    assert!(
        message.contains("input file missing"),
        "unexpected message: {message}"
    );
}
