//! Outgoing e-mail.
//!
//! Sending is fire-and-forget from the caller's point of view: callers log
//! failures and carry on.

use async_trait::async_trait;
use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use crate::errors::{AppError, AppResult};
use crate::jobs::EmailJob;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: EmailJob) -> AppResult<()>;
}

/// Writes messages to the log. Used in development and tests.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, job: EmailJob) -> AppResult<()> {
        tracing::info!(to = %job.to, subject = %job.subject, body = %job.body, "Email (log mailer)");
        Ok(())
    }
}

/// Enqueues messages for the `jobs work` worker.
#[derive(Clone)]
pub struct QueuedMailer {
    storage: PostgresStorage<EmailJob>,
}

impl QueuedMailer {
    /// Connect to the queue database, creating the apalis tables if needed.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .map_err(|e| AppError::internal(format!("Failed to connect to job queue: {}", e)))?;

        PostgresStorage::setup(&pool)
            .await
            .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

        tracing::info!("Email queue connected");

        Ok(Self {
            storage: PostgresStorage::new(pool),
        })
    }
}

#[async_trait]
impl Mailer for QueuedMailer {
    async fn send(&self, job: EmailJob) -> AppResult<()> {
        let mut storage = self.storage.clone();
        storage
            .push(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue email: {}", e)))?;
        Ok(())
    }
}
