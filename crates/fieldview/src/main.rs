//! fieldview server
//!
//! Hosts the render engine bridge and serves the presentation API over
//! WebSocket.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fieldview::fieldview_script::spawn_quickjs_bridge;
use fieldview::server::{AppState, create_router};
use fieldview::{ConfigOverrides, FieldviewConfig, PresentationRegistry};

/// Presentation pipeline server
#[derive(Parser, Debug)]
#[command(name = "fieldview")]
#[command(about = "Presentation pipeline server", long_about = None)]
struct Args {
    /// Configuration file (skipped if missing)
    #[arg(short, long, default_value = "fieldview.toml")]
    config: PathBuf,

    /// Server host address
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        host: args.host.clone(),
        port: args.port,
    };
    let config = FieldviewConfig::load(&args.config, &overrides)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_tracing(&config);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))
}

fn init_tracing(config: &FieldviewConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let (plain, json) = if config.logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

async fn async_main(config: FieldviewConfig) -> Result<()> {
    info!("Starting fieldview server v{}", env!("CARGO_PKG_VERSION"));

    let options = config.bridge_options().inspect_err(|e| error!("Failed to read preludes: {}", e))?;
    let bridge = spawn_quickjs_bridge(options).inspect_err(|e| error!("Failed to start engine: {}", e))?;
    info!("Engine bridge '{}' running", bridge.name());

    let registry = Arc::new(PresentationRegistry::new(bridge.clone(), config.display_defaults()));
    let app = create_router(AppState::new(registry.clone()));

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry.clone()))
        .await?;

    // Connections that outlived the signal may have opened new sessions.
    registry.shutdown().await;
    drop(registry);

    let joined = tokio::task::spawn_blocking(move || bridge.join()).await?;
    if let Err(e) = joined {
        warn!("Engine did not stop cleanly: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal and cleanup
async fn shutdown_signal(registry: Arc<PresentationRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }

    info!("Closing sessions...");
    registry.shutdown().await;
}
