use serde::{Deserialize, Serialize};

/// Limits and batch sizes for the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Largest accepted serialized node body, in bytes.
    pub max_node_size: usize,
    /// Nodes per insert transaction.
    pub node_batch_size: usize,
    /// Closure edges per insert transaction.
    pub closure_batch_size: usize,
    /// Concurrent transactions the backend admits.
    pub max_connections: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_node_size: 10 * 1024 * 1024,
            node_batch_size: 500,
            closure_batch_size: 1000,
            max_connections: 16,
        }
    }
}
