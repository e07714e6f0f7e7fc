pub mod assets;
pub mod broadcaster;
pub mod config;
pub mod db;
pub mod errors;
pub mod history;
pub mod models;
pub mod routes;
pub mod service;

use crate::assets::AssetPaths;
use crate::config::Config;
use crate::routes::AppState;
use crate::service::TickrCore;
use anyhow::Context;
use std::future::Future;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub async fn run(config: Config) -> anyhow::Result<()> {
    let core = TickrCore::open(&config.database, config.event_capacity)
        .with_context(|| format!("failed to open database at {}", config.database.display()))?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(
        %addr,
        event_capacity = core.broadcaster().capacity(),
        "tickr listening"
    );

    serve(listener, core, config.asset_paths(), shutdown_signal()).await?;
    tracing::info!("tickr stopped");
    Ok(())
}

/// Serves the app until `shutdown` resolves, then closes the live-update
/// streams so open event connections finish and the server can drain.
pub async fn serve(
    listener: tokio::net::TcpListener,
    core: TickrCore,
    assets: AssetPaths,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let broadcaster = core.broadcaster().clone();
    let app = routes::router(AppState::new(core, assets));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            broadcaster.close();
        })
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown requested");
}

/// Installs the global subscriber: JSON to a daily rolling file when
/// `log_dir` is set, plain text to stderr otherwise.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<(), String> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "tickr.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .try_init()
                .map_err(|error| error.to_string())
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|error| error.to_string()),
    }
}
