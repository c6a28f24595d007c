//! tunegate-music - multi-source music metadata resolver
//!
//! Serves search, playback-URL and lyric lookups over HTTP, backed by the
//! upstream providers listed in the TOML configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tunegate_common::config::{default_config_path, TomlConfig};
use tunegate_music::{build_router, AppState, Resolver};

/// Command-line arguments for tunegate-music
#[derive(Parser, Debug)]
#[command(name = "tunegate-music")]
#[command(about = "Multi-source music metadata resolver")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "TUNEGATE_PORT")]
    port: Option<u16>,

    /// Bind address (overrides config file)
    #[arg(short, long, env = "TUNEGATE_BIND")]
    bind: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, env = "TUNEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. "info" or "tunegate_music=debug"
    #[arg(short, long, env = "TUNEGATE_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging exists; its outcome is logged below
    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tunegate-music v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Loaded config from {}", path.display()),
        Some(path) => warn!("Config file {} not found, using compiled defaults", path.display()),
        None => info!("No config file found, using compiled defaults"),
    }

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate().context("Invalid configuration")?;

    let resolver = Resolver::from_config(&config).context("Failed to build resolver")?;
    let app = build_router(AppState::new(resolver));

    let addr = config.socket_addr().context("Invalid bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("tunegate-music listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
