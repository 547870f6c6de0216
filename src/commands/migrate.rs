//! Migrate command - schema management for Postgres and SQLite alike.

use sea_orm::DbErr;

use crate::cli::args::{MigrateAction, MigrateArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::Database;

pub async fn execute(args: MigrateArgs, config: Config) -> AppResult<()> {
    let db = Database::connect_without_migrations(&config)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;

    tracing::info!(action = ?args.action, backend = ?db.backend(), "Running migration command");

    match args.action {
        MigrateAction::Up => db.run_migrations().await.map_err(migration_error)?,
        MigrateAction::Down => db.rollback_migration().await.map_err(migration_error)?,
        MigrateAction::Fresh => {
            tracing::warn!("Dropping all tables before migrating");
            db.fresh_migrations().await.map_err(migration_error)?
        }
        MigrateAction::Status => {
            for (name, applied) in db.migration_status().await.map_err(migration_error)? {
                println!("{}: {}", name, if applied { "applied" } else { "pending" });
            }
            return Ok(());
        }
    }

    tracing::info!("Migration command completed");
    Ok(())
}

fn migration_error(e: DbErr) -> AppError {
    AppError::internal(format!("Migration failed: {}", e))
}
