//! Trellis CMS server.
//!
//! This binary:
//! - Loads `.env` and installs the tracing subscriber
//! - Opens the JSON site configuration (`TRELLIS_CONFIG`)
//! - Runs the initialization pipeline (config, logging, storage, themes, modules)
//! - Serves HTTP until Ctrl+C or SIGTERM
//! - Reloads configuration on SIGHUP
//!
//! # Usage
//!
//! ```bash
//! TRELLIS_CONFIG=conf/trellis.json PORT=8080 cargo run --bin trellis
//!
//! # Re-read the config file and re-run initialization
//! kill -HUP <pid>
//! ```

mod config;

use axum::{Router, routing::get};
use config::{DEFAULT_LOG_DIRECTIVES, ServerConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use trellis_postgres::PostgresDriver;
use trellis_runtime::metrics::MetricsServer;
use trellis_runtime::{FileConfigStore, ProcessTerminator, Trellis, init_subscriber};
use trellis_web::{AssetSlots, build_router, handlers::not_found};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let log_control = init_subscriber(DEFAULT_LOG_DIRECTIVES)?;

    let config = ServerConfig::from_env();
    info!(
        config_path = %config.config_path.display(),
        addr = %config.addr(),
        metrics_port = ?config.metrics_port,
        "Starting Trellis"
    );

    if let Some(addr) = config.metrics_addr() {
        let mut metrics = MetricsServer::new(addr);
        metrics.start()?;
        spawn_metrics_endpoint(metrics).await?;
    }

    let store = FileConfigStore::open(&config.config_path).await?;
    let slots = AssetSlots::new();
    let app = Trellis::builder()
        .config(Arc::new(store))
        .storage_driver(Arc::new(PostgresDriver::new()))
        .asset_mount(slots.static_files.clone())
        .asset_mount(slots.styles.clone())
        .log_control(Arc::new(log_control))
        .terminator(Arc::new(ProcessTerminator))
        .build()?;

    app.initialise(false).await?;
    spawn_reload_listener(Arc::clone(&app))?;

    let router = build_router(app, &slots, Router::new().fallback(not_found));
    let listener = TcpListener::bind(config.addr()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Serve the Prometheus exposition text on `/metrics`.
async fn spawn_metrics_endpoint(metrics: MetricsServer) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(metrics.addr()).await?;
    let metrics = Arc::new(metrics);
    let router = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.render().unwrap_or_default() }
        }),
    );

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "Metrics endpoint stopped");
        }
    });
    Ok(())
}

/// Re-run initialization with a fresh config read on every SIGHUP.
#[cfg(unix)]
fn spawn_reload_listener(app: Arc<Trellis>) -> Result<(), std::io::Error> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP signal");
            if let Err(e) = app.reload_config(None).await {
                error!(error = %e, "Configuration reload failed");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn spawn_reload_listener(_app: Arc<Trellis>) -> Result<(), std::io::Error> {
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
