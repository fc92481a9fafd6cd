use async_trait::async_trait;

use crate::error::TransportResult;

/// Receiver of finalized, serialized nodes.
///
/// `write` may suspend while an outbound batch is delivered. `flush` on an
/// empty buffer is a no-op.
#[async_trait]
pub trait Transport: Send {
    /// Hand over one serialized node of roughly `size` bytes.
    async fn write(&mut self, node: String, size: usize) -> TransportResult<()>;

    /// Deliver everything buffered so far.
    async fn flush(&mut self) -> TransportResult<()>;
}

/// Ingestion boundary: accepts one ordered batch of serialized nodes and
/// either takes all of it or fails as a whole.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn deliver(&self, batch: &[String]) -> TransportResult<()>;
}
