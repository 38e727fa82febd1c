use std::sync::Arc;

use stow_store::{BackendOptions, FileSystemBackend};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Stow HTTP server.
pub struct StowServer {
    config: ServerConfig,
}

impl StowServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured store and build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        let backend = FileSystemBackend::open(
            &self.config.store_root,
            BackendOptions {
                max_upload_size: Some(self.config.max_upload_size),
            },
        )
        .await?;
        Ok(build_router(Arc::new(backend)))
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            root = %self.config.store_root.display(),
            "Stow server listening on {}",
            self.config.bind_addr
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
