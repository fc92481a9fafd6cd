use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use trellis_store::{BatchWriter, WriteSummary};
use trellis_types::GraphId;

use crate::error::TransportResult;
use crate::traits::BatchSink;

/// Delivers batches straight into a store through a [`BatchWriter`].
pub struct StoreSink {
    writer: BatchWriter,
    graph: GraphId,
    totals: Mutex<WriteSummary>,
}

impl StoreSink {
    pub fn new(writer: BatchWriter, graph: GraphId) -> Self {
        Self {
            writer,
            graph,
            totals: Mutex::new(WriteSummary::default()),
        }
    }

    pub fn graph(&self) -> &GraphId {
        &self.graph
    }

    /// Accumulated outcome of every delivered batch.
    pub fn totals(&self) -> WriteSummary {
        self.totals.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl BatchSink for StoreSink {
    async fn deliver(&self, batch: &[String]) -> TransportResult<()> {
        let summary = self.writer.write_serialized(&self.graph, batch).await?;
        debug!(
            graph = %self.graph,
            nodes = summary.nodes_inserted,
            closures = summary.closures_inserted,
            "batch stored"
        );
        let mut totals = self.totals.lock().expect("lock poisoned");
        totals.ids.extend(summary.ids);
        totals.nodes_inserted += summary.nodes_inserted;
        totals.closures_inserted += summary.closures_inserted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::BatchingTransport;
    use crate::config::TransportConfig;
    use crate::error::TransportError;
    use crate::traits::Transport;
    use std::sync::Arc;
    use trellis_store::{InMemoryObjectStore, ObjectStore, StoreConfig};
    use trellis_types::ObjectId;

    fn body(tag: &str) -> String {
        let id = ObjectId::from_bytes(tag.as_bytes());
        serde_json::json!({"id": id.to_hex(), "type": "Base", "tag": tag}).to_string()
    }

    #[tokio::test]
    async fn delivers_into_store() {
        let store = Arc::new(InMemoryObjectStore::new());
        let graph = GraphId::new("sink").unwrap();
        let writer = BatchWriter::new(store.clone(), StoreConfig::default());
        let mut transport =
            BatchingTransport::new(StoreSink::new(writer, graph.clone()), TransportConfig::default());

        transport.write(body("a"), 10).await.unwrap();
        transport.write(body("b"), 10).await.unwrap();
        assert!(store.is_empty());
        transport.flush().await.unwrap();

        assert_eq!(store.len(), 2);
        let totals = transport.sink().totals();
        assert_eq!(totals.nodes_inserted, 2);
        assert!(store
            .get_node(&graph, &ObjectId::from_bytes(b"a"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn store_rejection_becomes_delivery_error() {
        let store = Arc::new(InMemoryObjectStore::new());
        let graph = GraphId::new("sink").unwrap();
        let writer = BatchWriter::new(
            store.clone(),
            StoreConfig {
                max_node_size: 8,
                ..StoreConfig::default()
            },
        );
        let mut transport =
            BatchingTransport::new(StoreSink::new(writer, graph), TransportConfig::default());
        transport.write(body("a"), 10).await.unwrap();

        let err = transport.flush().await.unwrap_err();
        match err {
            TransportError::Delivery { batch_len, reason } => {
                assert_eq!(batch_len, 1);
                assert!(reason.contains("too large"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.buffered(), 1);
        assert!(store.is_empty());
    }
}
