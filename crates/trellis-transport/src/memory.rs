use async_trait::async_trait;

use crate::error::TransportResult;
use crate::traits::Transport;

/// Transport that keeps every written node in memory, in write order.
///
/// Intended for tests and for callers that want the node set without a
/// store.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    nodes: Vec<String>,
    flushes: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Written nodes, children before the parents that reference them.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<String> {
        self.nodes
    }

    /// Number of `flush` calls seen.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write(&mut self, node: String, _size: usize) -> TransportResult<()> {
        self.nodes.push(node);
        Ok(())
    }

    async fn flush(&mut self) -> TransportResult<()> {
        self.flushes += 1;
        Ok(())
    }
}
