//! `conveyor-db` -- PostgreSQL-backed job store and upload registry.
//!
//! The database is the only coordination point between worker
//! processes: all queue state lives in the `jobs` and `uploads` tables,
//! and every transition passes through the repositories in this crate.

pub mod error;
pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a bounded connection pool from a database URL.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Run embedded migrations.
///
/// Safe to call from every process at startup; sqlx serialises
/// concurrent migrators through its advisory lock.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Cheap connectivity probe.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
