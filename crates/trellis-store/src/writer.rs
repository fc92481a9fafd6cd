use std::sync::Arc;

use tracing::debug;
use trellis_types::{ClosureEdge, GraphId, ObjectId};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{NodeRecord, NodeRow};
use crate::traits::ObjectStore;

/// Outcome of one [`BatchWriter`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Ids of the submitted nodes, in submission order.
    pub ids: Vec<ObjectId>,
    /// Node rows that were not already present.
    pub nodes_inserted: usize,
    /// Closure edges that were not already present.
    pub closures_inserted: usize,
}

/// Ingests serialized nodes into an [`ObjectStore`] in bounded, sorted
/// batches.
///
/// Node rows go in first, in batches of [`StoreConfig::node_batch_size`]
/// sorted by id; closure edges follow in batches of
/// [`StoreConfig::closure_batch_size`] sorted by `(parent, child)`. Sorted
/// batches keep concurrent writers acquiring row locks in the same order.
pub struct BatchWriter {
    store: Arc<dyn ObjectStore>,
    config: StoreConfig,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn ObjectStore>, config: StoreConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Parse and write serialized node bodies.
    pub async fn write_serialized(
        &self,
        graph: &GraphId,
        bodies: &[String],
    ) -> StoreResult<WriteSummary> {
        let records = bodies
            .iter()
            .map(|body| NodeRecord::parse(body))
            .collect::<StoreResult<Vec<_>>>()?;
        self.write_records(graph, records).await
    }

    /// Write already parsed JSON objects, as received in an upload body.
    pub async fn write_values(
        &self,
        graph: &GraphId,
        values: Vec<serde_json::Value>,
    ) -> StoreResult<WriteSummary> {
        let records = values
            .into_iter()
            .map(NodeRecord::from_value)
            .collect::<StoreResult<Vec<_>>>()?;
        self.write_records(graph, records).await
    }

    /// Write nodes and their closure edges.
    ///
    /// Fails with [`StoreError::OversizedNode`] before touching the store if
    /// any body exceeds the size limit. A failure part-way leaves earlier
    /// batches committed; since every insert is "insert if absent", calling
    /// again with the same input completes the write.
    pub async fn write_records(
        &self,
        graph: &GraphId,
        records: Vec<NodeRecord>,
    ) -> StoreResult<WriteSummary> {
        for record in &records {
            if record.size() > self.config.max_node_size {
                return Err(StoreError::OversizedNode {
                    id: record.id,
                    size: record.size(),
                    max: self.config.max_node_size,
                });
            }
        }

        let ids: Vec<ObjectId> = records.iter().map(|r| r.id).collect();
        let mut rows: Vec<NodeRow> = Vec::with_capacity(records.len());
        let mut edges: Vec<ClosureEdge> = Vec::new();
        for record in records {
            let (row, row_edges) = record.into_row(graph);
            rows.push(row);
            edges.extend(row_edges);
        }

        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows.dedup_by(|a, b| a.id == b.id);
        edges.sort_by(|a, b| (a.parent, a.child).cmp(&(b.parent, b.child)));
        edges.dedup_by(|a, b| a.parent == b.parent && a.child == b.child);

        let mut summary = WriteSummary {
            ids,
            ..WriteSummary::default()
        };

        let node_batch = self.config.node_batch_size.max(1);
        for (i, batch) in rows.chunks(node_batch).enumerate() {
            let inserted = self.store.insert_nodes(batch.to_vec()).await?;
            debug!(graph = %graph, batch = i, size = batch.len(), inserted, "node batch");
            summary.nodes_inserted += inserted;
        }

        let closure_batch = self.config.closure_batch_size.max(1);
        for (i, batch) in edges.chunks(closure_batch).enumerate() {
            let inserted = self.store.insert_closures(batch.to_vec()).await?;
            debug!(graph = %graph, batch = i, size = batch.len(), inserted, "closure batch");
            summary.closures_inserted += inserted;
        }

        debug!(
            graph = %graph,
            submitted = summary.ids.len(),
            nodes = summary.nodes_inserted,
            closures = summary.closures_inserted,
            "write complete"
        );
        Ok(summary)
    }
}
