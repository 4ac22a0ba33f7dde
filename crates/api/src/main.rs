use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use meterdeck_api::auth::bootstrap::ensure_bootstrap_admin;
use meterdeck_api::background::{credential_cleanup, rate_limit_sweep};
use meterdeck_api::config::{AuthMode, ConfigError, LogFormat, ServerConfig};
use meterdeck_api::error::AppError;
use meterdeck_api::router::build_app_router;
use meterdeck_api::state::AppState;
use meterdeck_api::telemetry::init_tracing;
use meterdeck_api::usage::{SnapshotUsageProvider, UsageError, UsageProvider};
use meterdeck_db::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
use tokio_util::sync::CancellationToken;

/// Anything that stops the server from coming up.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("usage snapshot: {0}")]
    Usage(#[from] UsageError),
    #[error("admin bootstrap failed: {0}")]
    Bootstrap(#[from] AppError),
    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // --- Tracing ---
    init_tracing(config.log_format);
    tracing::info!(
        host = %config.host,
        port = config.port,
        auth_mode = %config.auth.mode,
        "Loaded server configuration"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    // --- Credential store ---
    let store = open_store(&config).await?;

    if config.auth.mode == AuthMode::Accounts {
        if let Some(admin) = &config.auth.bootstrap_admin {
            ensure_bootstrap_admin(store.as_ref(), admin).await?;
        }
    }
    if config.auth.secret.is_none() {
        tracing::warn!("AUTH_SECRET is not set, every protected endpoint will answer 500");
    }

    // --- Usage data ---
    let usage: Arc<dyn UsageProvider> = match &config.usage_snapshot_path {
        Some(path) => {
            let provider = SnapshotUsageProvider::load(path).await?;
            tracing::info!(path = %path.display(), "Usage snapshot loaded");
            Arc::new(provider)
        }
        None => Arc::new(SnapshotUsageProvider::empty()),
    };

    // --- App state ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let sweep_period = Duration::from_secs(config.rate_limit_sweep_secs);
    let cleanup_period = Duration::from_secs(config.cleanup_interval_secs);
    let shutdown_budget = Duration::from_secs(config.shutdown_timeout_secs);

    let state = AppState::new(config, Arc::clone(&store), usage);

    // --- Background jobs ---
    let cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(rate_limit_sweep::run(
        Arc::downgrade(&state.rate_limiter),
        sweep_period,
        cancel.clone(),
    ));
    let cleanup_handle = tokio::spawn(credential_cleanup::run(
        Arc::clone(&store),
        cleanup_period,
        cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state)?;

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let drained = tokio::time::timeout(shutdown_budget, async {
        let _ = sweep_handle.await;
        let _ = cleanup_handle.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = shutdown_budget.as_secs(),
            "Background jobs did not stop in time"
        );
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-process store.
async fn open_store(config: &ServerConfig) -> Result<Arc<dyn CredentialStore>, StartupError> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL is not set, using the in-memory credential store");
        return Ok(Arc::new(MemoryCredentialStore::new()));
    };

    let pool = meterdeck_db::create_pool(database_url).await?;
    tracing::info!("Database connection pool created");

    meterdeck_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    meterdeck_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(PgCredentialStore::new(pool)))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
