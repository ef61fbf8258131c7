use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipfetch_core::{load_config, load_config_from_env, validate_config, Config, ConfigError};
use clipfetch_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("clipfetch {}", VERSION);

    let config = load(&config_path())?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Scratch root: {:?}", config.acquisition.scratch_dir);
    info!(
        fetcher = config.fetcher.enabled,
        fallback = config.fallback.enabled,
        "Strategy chain configured"
    );

    let state = Arc::new(AppState::from_config(config.clone()));

    // Leftovers from a previous crash
    state
        .orchestrator()
        .scratch()
        .sweep_stale(Duration::from_secs(config.acquisition.stale_scratch_secs))
        .await;

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    Ok(())
}

fn config_path() -> PathBuf {
    std::env::var("CLIPFETCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// File plus environment, or environment alone when the file is absent.
fn load(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    match load_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            warn!("No config file at {:?}, using defaults and environment", path);
            load_config_from_env().context("Failed to load config from environment")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
