use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use trellis_types::{ClosureEdge, GraphId, ObjectId};

use crate::error::StoreResult;
use crate::record::NodeRow;

/// Keyset-paginated query over a node's closure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildrenQuery {
    /// Return only children whose id sorts strictly after this one.
    pub after: Option<ObjectId>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Return only children whose `min_depth` is at most this.
    pub max_depth: Option<u32>,
}

impl ChildrenQuery {
    /// First page of `limit` rows, any depth.
    pub fn first(limit: usize) -> Self {
        Self {
            after: None,
            limit,
            max_depth: None,
        }
    }
}

/// A closure-joined descendant row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildRow {
    pub min_depth: u32,
    pub node: NodeRow,
}

/// Persistence backend for nodes and closure edges.
///
/// All implementations must satisfy these invariants:
/// - `insert_*` calls are "insert if absent": rows whose key already exists
///   are left untouched and the call still succeeds.
/// - One `insert_*` call is one transaction: either every absent row of the
///   batch becomes visible or none does.
/// - Each call acquires a pooled connection for its own duration only.
/// - Reads are ordered by id so paging and streaming are deterministic.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Insert node rows not already present. Returns how many were new.
    async fn insert_nodes(&self, rows: Vec<NodeRow>) -> StoreResult<usize>;

    /// Insert closure edges not already present. Returns how many were new.
    async fn insert_closures(&self, edges: Vec<ClosureEdge>) -> StoreResult<usize>;

    /// Fetch one node. `Ok(None)` if absent.
    async fn get_node(&self, graph: &GraphId, id: &ObjectId) -> StoreResult<Option<NodeRow>>;

    /// Fetch the present subset of `ids`, ordered by id.
    async fn get_nodes(&self, graph: &GraphId, ids: &[ObjectId]) -> StoreResult<Vec<NodeRow>>;

    /// One page of `parent`'s closure joined with the node rows, ordered by
    /// child id. Edges whose node row is absent are not returned.
    async fn children_page(
        &self,
        graph: &GraphId,
        parent: &ObjectId,
        query: &ChildrenQuery,
    ) -> StoreResult<Vec<ChildRow>>;

    /// Report, for each requested id, whether the node is present.
    ///
    /// Default implementation goes through `get_nodes()`. Backends may
    /// override to avoid loading bodies.
    async fn has_nodes(
        &self,
        graph: &GraphId,
        ids: &[ObjectId],
    ) -> StoreResult<BTreeMap<ObjectId, bool>> {
        let mut result: BTreeMap<ObjectId, bool> = ids.iter().map(|id| (*id, false)).collect();
        for row in self.get_nodes(graph, ids).await? {
            result.insert(row.id, true);
        }
        Ok(result)
    }
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn insert_nodes(&self, rows: Vec<NodeRow>) -> StoreResult<usize> {
        (**self).insert_nodes(rows).await
    }

    async fn insert_closures(&self, edges: Vec<ClosureEdge>) -> StoreResult<usize> {
        (**self).insert_closures(edges).await
    }

    async fn get_node(&self, graph: &GraphId, id: &ObjectId) -> StoreResult<Option<NodeRow>> {
        (**self).get_node(graph, id).await
    }

    async fn get_nodes(&self, graph: &GraphId, ids: &[ObjectId]) -> StoreResult<Vec<NodeRow>> {
        (**self).get_nodes(graph, ids).await
    }

    async fn children_page(
        &self,
        graph: &GraphId,
        parent: &ObjectId,
        query: &ChildrenQuery,
    ) -> StoreResult<Vec<ChildRow>> {
        (**self).children_page(graph, parent, query).await
    }

    async fn has_nodes(
        &self,
        graph: &GraphId,
        ids: &[ObjectId],
    ) -> StoreResult<BTreeMap<ObjectId, bool>> {
        (**self).has_nodes(graph, ids).await
    }
}
