use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::traits::{BatchSink, Transport};

/// Running totals of delivered batches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub batches: usize,
    pub nodes: usize,
    pub bytes: usize,
}

/// Buffers serialized nodes and delivers them to a [`BatchSink`] once the
/// buffered size reaches [`TransportConfig::max_batch_bytes`].
pub struct BatchingTransport<S> {
    sink: S,
    config: TransportConfig,
    buffer: Vec<String>,
    buffered_bytes: usize,
    stats: TransportStats,
}

impl<S: BatchSink> BatchingTransport<S> {
    pub fn new(sink: S, config: TransportConfig) -> Self {
        Self {
            sink,
            config,
            buffer: Vec::new(),
            buffered_bytes: 0,
            stats: TransportStats::default(),
        }
    }

    /// Nodes waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[async_trait]
impl<S: BatchSink> Transport for BatchingTransport<S> {
    async fn write(&mut self, node: String, size: usize) -> TransportResult<()> {
        self.buffer.push(node);
        self.buffered_bytes += size;
        if self.buffered_bytes >= self.config.max_batch_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> TransportResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch_len = self.buffer.len();
        if let Err(e) = self.sink.deliver(&self.buffer).await {
            warn!(batch_len, error = %e, "batch delivery failed; buffer kept");
            return Err(match e {
                TransportError::Delivery { .. } => e,
                other => TransportError::Delivery {
                    batch_len,
                    reason: other.to_string(),
                },
            });
        }

        debug!(batch_len, bytes = self.buffered_bytes, "batch delivered");
        self.stats.batches += 1;
        self.stats.nodes += batch_len;
        self.stats.bytes += self.buffered_bytes;
        self.buffer.clear();
        self.buffered_bytes = 0;
        Ok(())
    }
}
