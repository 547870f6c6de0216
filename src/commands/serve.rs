//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database, LogMailer, Mailer, MemoryRateLimiter, QueuedMailer, RateLimiter};

/// Execute the serve command
pub async fn execute(args: ServeArgs, mut config: Config) -> AppResult<()> {
    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }

    tracing::info!("Starting server...");

    let db = Arc::new(
        Database::connect_without_migrations(&config)
            .await
            .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?,
    );
    db.run_migrations()
        .await
        .map_err(|e| AppError::internal(format!("Migrations failed: {}", e)))?;
    tracing::info!("Database connected and migrations applied");

    let rate_limiter = rate_limiter(&config).await;
    let mailer = mailer(&config).await?;

    let addr = config.server_addr();
    let app = create_router(AppState::from_config(db, rate_limiter, mailer, config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    // Peer addresses key the rate limiter when no proxy header is present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Redis when configured and reachable, the in-process limiter otherwise.
async fn rate_limiter(config: &Config) -> Arc<dyn RateLimiter> {
    if let Some(url) = &config.redis_url {
        match Cache::try_connect(url).await {
            Ok(cache) => {
                tracing::info!("Redis rate limiter connected");
                return Arc::new(cache);
            }
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), falling back to in-memory rate limiting", e);
            }
        }
    }

    Arc::new(MemoryRateLimiter::new())
}

async fn mailer(config: &Config) -> AppResult<Arc<dyn Mailer>> {
    if !config.mail_queue {
        return Ok(Arc::new(LogMailer));
    }

    if !config.is_postgres() {
        return Err(AppError::internal("MAIL_QUEUE requires a Postgres DATABASE_URL"));
    }

    Ok(Arc::new(QueuedMailer::connect(&config.database_url).await?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
