use std::sync::Arc;

use tokio::net::TcpListener;

use hoard_store::FsObjectStore;

use crate::config::HoardConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Hoard HTTP server.
pub struct HoardServer {
    config: HoardConfig,
    store: Arc<FsObjectStore>,
}

impl HoardServer {
    /// Validate the configuration and open the store.
    pub fn new(config: HoardConfig) -> ServerResult<Self> {
        config.server.validate()?;
        let store = Arc::new(FsObjectStore::open(config.store.clone())?);
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &HoardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<FsObjectStore> {
        &self.store
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.store.clone()), &self.config.server)
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.server.bind_addr).await?;
        tracing::info!(
            "Hoard server listening on {} (root: {})",
            self.config.server.bind_addr,
            self.store.root().display()
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
