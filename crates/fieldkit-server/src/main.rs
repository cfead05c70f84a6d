//! # fieldkit-server
//!
//! HTTP server for the fieldkit device tools.
//!
//! This binary provides:
//! - REST API for weather, Bluetooth, Wi-Fi and barcode history
//! - OpenAPI documentation at `/api/openapi.json`
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package fieldkit-server
//!
//! # Production
//! FIELDKIT_ENV=production ./fieldkit-server
//! ```
//!
//! `FIELDKIT_CONFIG` overrides the configuration file location.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;
use std::sync::Arc;

use fieldkit_core::config::default_config_path;
use fieldkit_core::Config;
use fieldkit_server::{api, logging, state::AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(logging::is_production())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting fieldkit-server");

    // An explicit config path must exist; the default one is optional.
    let (config_path, config) = match std::env::var_os("FIELDKIT_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            let config = Config::load_required(&path)?;
            (path, config)
        }
        None => {
            let path = default_config_path();
            let config = Config::load(Some(&path))?;
            if !path.exists() {
                match config.save(&path) {
                    Ok(()) => info!(path = %path.display(), "Wrote default configuration"),
                    Err(e) => warn!(error = %e, "Failed to write default configuration"),
                }
            }
            (path, config)
        }
    };
    info!(path = %config_path.display(), "Configuration loaded");

    let state = Arc::new(AppState::new(config).await?);
    if state.bluetooth.is_none() {
        warn!("Bluetooth routes will answer 503");
    }

    let addr = state.config.listen_address();
    let app = api::create_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.stop_scan().await;
    info!("fieldkit-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
