use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveConfig {
    /// Closure rows fetched from the store per query.
    pub page_size: usize,
    /// Rows buffered between the store reader and the consumer.
    pub high_water_mark: usize,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            high_water_mark: 64,
        }
    }
}
