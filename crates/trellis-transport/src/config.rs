use serde::{Deserialize, Serialize};

/// Flush policy for [`crate::BatchingTransport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Buffered bytes at which a write triggers a flush.
    pub max_batch_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: 1024 * 1024,
        }
    }
}
