use std::sync::Arc;

use tokio::net::TcpListener;
use trellis_store::{InMemoryObjectStore, JournalConfig, ObjectStore};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Trellis ingestion and retrieval server.
pub struct TrellisServer {
    state: AppState,
}

impl TrellisServer {
    /// Open the configured store, replaying its journal if one is set.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = match &config.store_path {
            Some(path) => {
                InMemoryObjectStore::open(path, config.store.clone(), JournalConfig::default())?
            }
            None => InMemoryObjectStore::with_config(config.store.clone()),
        };
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Serve an existing store.
    pub fn with_store(store: Arc<dyn ObjectStore>, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(store, config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.state.config.bind_addr;
        let app = self.router();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Trellis server listening on {}", addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
