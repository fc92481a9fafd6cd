use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trellis_retrieve::RetrieveConfig;
use trellis_store::StoreConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Journal file backing the store. `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,
    /// Largest accepted upload body, after gzip decoding.
    pub max_upload_size: usize,
    pub store: StoreConfig,
    pub retrieve: RetrieveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            store_path: None,
            max_upload_size: 100 * 1024 * 1024,
            store: StoreConfig::default(),
            retrieve: RetrieveConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
