//! Beacon - production warning light service
//!
//! Usage: `beacon [config.toml]`
//!
//! Connects to the DMX bridge, starts the pulse animation and serves the
//! start/stop/status control surface until Ctrl-C or SIGTERM.

#![warn(missing_docs)]

mod logging_setup;

use anyhow::{Context, Result};
use beacon_control::{BeaconConfig, SerialLocator, WarningInstance, WebServer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "beacon.toml";

/// Load the config from an explicit path, or from `beacon.toml` if present
fn load_config(explicit: Option<PathBuf>) -> Result<BeaconConfig> {
    match explicit {
        Some(path) => BeaconConfig::load(&path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                BeaconConfig::load(path)
                    .with_context(|| format!("Failed to load config {:?}", path))
            } else {
                Ok(BeaconConfig::default())
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown requested");
}

/// The main entry point for the service.
fn main() -> Result<()> {
    let config = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;
    let _log_guard = logging_setup::init(&config.logging)?;

    info!("==========================================");
    info!("===      Beacon Session Started        ===");
    info!("==========================================");

    let instance = Arc::new(
        WarningInstance::start(&config, Arc::new(SerialLocator::new()))
            .context("Failed to start warning beacon")?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.web.worker_threads)
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let server = WebServer::new(config.web.clone(), instance.clone());
    let served = runtime.block_on(server.run(shutdown_signal()));

    if let Err(e) = instance.shutdown() {
        error!("Bridge shutdown failed: {}", e);
    }
    info!("Done.");

    served.context("Control surface failed")
}
