//! # Forex API Server
//!
//! HTTP JSON server for the Forex desktop client.
//!
//! ## Startup
//! ```text
//! .env ──► ApiConfig ──► SQLite (migrations) ──► S3 bucket check
//!                                   │
//!                                   ├──► admin bootstrap
//!                                   ├──► TempCleanup (background)
//!                                   └──► axum::serve (graceful shutdown)
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use forex_api::cleanup::TempCleanup;
use forex_api::config::ApiConfig;
use forex_api::services::auth::bootstrap_admin;
use forex_api::storage::{FileStorage, S3FileStorage};
use forex_api::{router, AppState};
use forex_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment wins anyway
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("forex_api=info,forex_db=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    info!("Starting Forex API server...");

    let config = ApiConfig::load().context("invalid configuration")?;
    info!(
        addr = %config.bind_address(),
        database = %config.database_path,
        bucket = %config.storage.bucket,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await
    .context("failed to open database")?;

    let s3 = S3FileStorage::new(&config.storage);
    if let Err(e) = s3
        .ensure_bucket(&config.storage.region, config.storage.enable_public_read)
        .await
    {
        // Uploads fail until storage is reachable; the rest of the API works
        warn!(error = %e, "Object storage is not ready");
    }
    let storage: Arc<dyn FileStorage> = Arc::new(s3);

    match bootstrap_admin(&db, &config).await {
        Ok(Some(id)) => info!(user_id = %id, "Admin account ready"),
        Ok(None) => {}
        Err(e) => error!(error = %e.message, "Admin bootstrap failed"),
    }

    let (cleanup, cleanup_handle) = TempCleanup::new(
        storage.clone(),
        config.storage.temp_max_age(),
        config.storage.cleanup_interval(),
    );
    tokio::spawn(cleanup.run());

    let bind_addr = config.bind_address();
    let state = AppState::new(db.clone(), config, storage);
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    cleanup_handle.shutdown().await;
    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
