//! apo-engine - Automation Potential Overview scoring service
//!
//! Serves APO scores over HTTP. O*NET and SERP are used when enabled and
//! credentialed; otherwise deterministic synthetic data stands in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use apo_common::config::ConfigResolver;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apo_engine::sources::{OnetClient, SerpClient};
use apo_engine::{build_router, ApoEngine, AppState, EngineConfig, EngineSources};

/// Command-line arguments for apo-engine
#[derive(Parser, Debug)]
#[command(name = "apo-engine")]
#[command(about = "Automation Potential Overview scoring service")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long, env = "APO_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.resolve().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("apo_engine={0},apo_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting APO engine v{} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );
    if let Some(path) = resolver.config_path() {
        info!("Config path: {}", path.display());
    }

    let mut sources = EngineSources::mock_only();
    if config.features.use_onet {
        match OnetClient::new(&config.onet) {
            Ok(client) => sources = sources.with_occupation(Arc::new(client)),
            Err(e) => warn!("O*NET client unavailable, using synthetic data: {}", e),
        }
    }
    if config.features.use_serp {
        match SerpClient::new(&config.serp) {
            Ok(client) => sources = sources.with_research(Arc::new(client)),
            Err(e) => warn!("SERP client unavailable, using synthetic data: {}", e),
        }
    }

    let mut features = config.features;
    features.use_onet = sources.occupation.is_some();
    features.use_serp = sources.research.is_some();

    let engine = ApoEngine::new(EngineConfig::from_app_config(&config), sources);
    let app = build_router(AppState::new(engine, features));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("apo-engine listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
