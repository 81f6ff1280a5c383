//! Axum HTTP server

use std::future::Future;
use std::sync::Arc;

use crate::config::WebServerConfig;
use crate::warning::WarningControl;
use crate::{error::ControlError, Result};

use super::routes::build_router;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub control: Arc<dyn WarningControl>,
}

/// Control surface server
pub struct WebServer {
    config: WebServerConfig,
    state: AppState,
}

impl WebServer {
    pub fn new(config: WebServerConfig, control: Arc<dyn WarningControl>) -> Self {
        Self {
            config,
            state: AppState { control },
        }
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ControlError::HttpError(format!("Failed to bind {}: {}", address, e)))?;

        let local = listener.local_addr()?;
        tracing::info!("Control surface listening on {}", local);

        let app = build_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ControlError::HttpError(format!("Server error: {}", e)))?;

        tracing::info!("Control surface stopped");
        Ok(())
    }

    /// Spawn the server on the current runtime
    pub fn spawn<F>(self, shutdown: F) -> tokio::task::JoinHandle<Result<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
