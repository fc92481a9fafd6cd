use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Elements per `DataChunk` when a field does not name its own size.
    pub chunk_size: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self { chunk_size: 1000 }
    }
}
