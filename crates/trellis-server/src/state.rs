use std::sync::Arc;

use trellis_retrieve::Retriever;
use trellis_store::{BatchWriter, ObjectStore};

use crate::config::ServerConfig;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub writer: Arc<BatchWriter>,
    pub retriever: Retriever,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, config: ServerConfig) -> Self {
        Self {
            writer: Arc::new(BatchWriter::new(Arc::clone(&store), config.store.clone())),
            retriever: Retriever::new(Arc::clone(&store), config.retrieve.clone()),
            store,
            config: Arc::new(config),
        }
    }
}
