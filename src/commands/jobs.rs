//! Jobs command - the e-mail queue.
//!
//! The queue lives in apalis' Postgres storage, so every action needs a
//! Postgres `DATABASE_URL`.
//!
//! ```bash
//! expense-manager jobs work   # deliver queued mail until Ctrl+C
//! expense-manager jobs list   # counts by status
//! expense-manager jobs clear  # drop failed jobs
//! ```

use apalis_sql::sqlx::postgres::{PgPool, PgPoolOptions};
use apalis_sql::sqlx::Row;

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};

pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    if !config.is_postgres() {
        return Err(AppError::internal(
            "The job queue requires a Postgres DATABASE_URL",
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))?;

    match args.action {
        JobsAction::Work => run_worker(pool).await,
        JobsAction::List => list_jobs(&pool).await,
        JobsAction::Clear => clear_failed_jobs(&pool).await,
    }
}

/// Deliver queued e-mail until interrupted.
async fn run_worker(pool: PgPool) -> AppResult<()> {
    use apalis::prelude::*;
    use apalis_sql::postgres::PostgresStorage;

    use crate::jobs::{email_job_handler, EmailJob};

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    let storage: PostgresStorage<EmailJob> = PostgresStorage::new(pool);

    let worker = WorkerBuilder::new("email-worker")
        .backend(storage)
        .build_fn(email_job_handler);

    tracing::info!("Email worker started. Press Ctrl+C to stop.");

    tokio::select! {
        result = Monitor::new().register(worker).run() => {
            result.map_err(|e| AppError::internal(format!("Worker failed: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Email worker stopped.");
    Ok(())
}

/// Whether `jobs work` (or a queued mailer) has created the apalis schema yet.
async fn queue_exists(pool: &PgPool) -> AppResult<bool> {
    let row = apalis_sql::sqlx::query(
        "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis')",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::internal(format!("Query failed: {}", e)))?;

    row.try_get::<bool, _>(0)
        .map_err(|e| AppError::internal(format!("Query failed: {}", e)))
}

async fn list_jobs(pool: &PgPool) -> AppResult<()> {
    if !queue_exists(pool).await? {
        println!("Email queue not initialized. Run 'jobs work' first.");
        return Ok(());
    }

    let rows = apalis_sql::sqlx::query(
        "SELECT status::text, COUNT(*)::bigint FROM apalis.jobs GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::internal(format!("Query failed: {}", e)))?;

    println!("\n=== Email Queue ===");
    if rows.is_empty() {
        println!("(empty)");
    }
    for row in rows {
        let status: String = row.try_get(0).unwrap_or_default();
        let count: i64 = row.try_get(1).unwrap_or_default();
        println!("{:<10}{}", status, count);
    }
    println!("===================\n");

    Ok(())
}

async fn clear_failed_jobs(pool: &PgPool) -> AppResult<()> {
    if !queue_exists(pool).await? {
        println!("Email queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = apalis_sql::sqlx::query("DELETE FROM apalis.jobs WHERE status = 'Failed'")
        .execute(pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to clear jobs: {}", e)))?;

    println!("Cleared {} failed job(s) from the queue.", result.rows_affected());
    Ok(())
}
