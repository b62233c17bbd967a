//! ERP Server - Main Application Entry Point
//!
//! REST API for a multi-tenant ERP: human resources (employees, absences,
//! vacations, payroll, loans), accounts receivable and payable, warehouse
//! stock, customers and promotions.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, role-based permissions
//! - **Rate limiting**: fixed window counters in Redis (or memory)
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Connect the rate-limit store and the file storage backend
//! 5. Optionally bootstrap the first tenant and its admin key
//! 6. Build HTTP router with routes and middleware
//! 7. Start server on configured port

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use erp_server::app::{self, AppState};
use erp_server::config::Config;
use erp_server::db;
use erp_server::repositories::Repositories;
use erp_server::services::rate_limit_service::{
    MemoryRateLimitStore, RateLimitStore, RateLimiter, RedisRateLimitStore,
};
use erp_server::services::{AuditSigner, Context, WebhookDispatcher, auth_service, storage_service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let repos = Repositories::postgres(pool);
    let webhooks = WebhookDispatcher::new(repos.webhooks.clone(), config.webhook_timeout_secs);
    let ctx = Context::new(repos, AuditSigner::new(&config.audit_signing_secret), webhooks);

    let rate_limit_store = rate_limit_store(&config).await;
    let rate_limiter = RateLimiter::new(
        rate_limit_store,
        config.rate_limit_requests,
        Duration::from_secs(config.rate_limit_window_secs),
    );

    let storage = storage_service::from_config(&config).context("file storage")?;
    tracing::info!(driver = ?config.storage_driver, "File storage ready");

    if let (Some(name), Some(email), Some(key)) = (
        &config.bootstrap_tenant_name,
        &config.bootstrap_admin_email,
        &config.bootstrap_admin_key,
    ) {
        let tenant = auth_service::bootstrap(&ctx, name, email, key)
            .await
            .context("bootstrap tenant")?;
        tracing::info!(tenant_id = %tenant.id, "Bootstrap tenant ready");
    }

    let app = app::build_router(AppState {
        ctx,
        storage: Arc::from(storage),
        rate_limiter,
        upload_max_bytes: config.upload_max_bytes,
    });

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Redis when configured and reachable, per-process counters otherwise.
async fn rate_limit_store(config: &Config) -> Arc<dyn RateLimitStore> {
    let Some(url) = &config.redis_url else {
        tracing::info!("REDIS_URL not set, rate limits are per process");
        return Arc::new(MemoryRateLimitStore::default());
    };
    match RedisRateLimitStore::connect(url).await {
        Ok(store) => {
            tracing::info!("Rate limit counters in Redis");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, falling back to per-process rate limits");
            Arc::new(MemoryRateLimitStore::default())
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
