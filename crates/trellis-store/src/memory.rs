use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, info};
use trellis_types::{ClosureEdge, GraphId, ObjectId};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, JournalConfig, JournalRecord};
use crate::record::NodeRow;
use crate::traits::{ChildRow, ChildrenQuery, ObjectStore};

type NodeKey = (GraphId, ObjectId);
type EdgeKey = (GraphId, ObjectId, ObjectId);

#[derive(Default)]
struct Tables {
    nodes: BTreeMap<NodeKey, NodeRow>,
    closures: BTreeMap<EdgeKey, u32>,
}

impl Tables {
    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::Nodes(rows) => {
                for row in rows {
                    self.nodes
                        .entry((row.graph.clone(), row.id))
                        .or_insert(row);
                }
            }
            JournalRecord::Closures(edges) => {
                for edge in edges {
                    self.closures
                        .entry((edge.graph, edge.parent, edge.child))
                        .or_insert(edge.min_depth);
                }
            }
        }
    }
}

/// BTreeMap-backed object store.
///
/// Tables live behind a `RwLock`; a semaphore sized by
/// [`StoreConfig::max_connections`] stands in for the connection pool. When
/// opened with a journal, every insert transaction is appended to it before
/// being applied, and the journal is replayed on open.
///
/// Inserts are serialized by a commit lock. The journal append runs on the
/// blocking pool with no table lock held, so reads are not stalled by disk
/// I/O or `fsync`.
pub struct InMemoryObjectStore {
    tables: RwLock<Tables>,
    commit_lock: Mutex<()>,
    pool: Semaphore,
    journal: Option<Arc<Journal>>,
    config: StoreConfig,
}

impl InMemoryObjectStore {
    /// Create an empty, volatile store with default limits.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty, volatile store.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            commit_lock: Mutex::new(()),
            pool: Semaphore::new(config.max_connections.max(1)),
            journal: None,
            config,
        }
    }

    /// Open a durable store backed by the journal at `path`, replaying
    /// whatever it already holds.
    pub fn open(path: &Path, config: StoreConfig, journal: JournalConfig) -> StoreResult<Self> {
        let (journal, records) = Journal::open(path, journal)?;
        let mut tables = Tables::default();
        let replayed = records.len();
        for record in records {
            tables.apply(record);
        }
        info!(
            path = %path.display(),
            replayed,
            nodes = tables.nodes.len(),
            closures = tables.closures.len(),
            "store opened"
        );
        Ok(Self {
            tables: RwLock::new(tables),
            commit_lock: Mutex::new(()),
            pool: Semaphore::new(config.max_connections.max(1)),
            journal: Some(Arc::new(journal)),
            config,
        })
    }

    /// Number of node rows across all graphs.
    pub fn len(&self) -> usize {
        self.tables.read().expect("lock poisoned").nodes.len()
    }

    /// Returns `true` if no node rows are stored.
    pub fn is_empty(&self) -> bool {
        self.tables.read().expect("lock poisoned").nodes.is_empty()
    }

    /// Number of closure edges across all graphs.
    pub fn closure_len(&self) -> usize {
        self.tables.read().expect("lock poisoned").closures.len()
    }

    /// Sorted ids of every node stored in `graph`.
    pub fn ids(&self, graph: &GraphId) -> Vec<ObjectId> {
        let tables = self.tables.read().expect("lock poisoned");
        tables
            .nodes
            .range((graph.clone(), ObjectId::null())..)
            .take_while(|((g, _), _)| g == graph)
            .map(|((_, id), _)| *id)
            .collect()
    }

    /// Permits not currently held by a transaction.
    pub fn available_connections(&self) -> usize {
        self.pool.available_permits()
    }

    /// Close the pool. Later operations fail with [`StoreError::PoolClosed`].
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn connection(&self) -> StoreResult<SemaphorePermit<'_>> {
        self.pool.acquire().await.map_err(|_| StoreError::PoolClosed)
    }

    /// Drop rows that are already stored or repeated within the batch.
    fn fresh(&self, record: JournalRecord) -> JournalRecord {
        let tables = self.tables.read().expect("lock poisoned");
        match record {
            JournalRecord::Nodes(rows) => {
                let mut seen = BTreeMap::new();
                for row in rows {
                    let key = (row.graph.clone(), row.id);
                    if !tables.nodes.contains_key(&key) {
                        seen.entry(key).or_insert(row);
                    }
                }
                JournalRecord::Nodes(seen.into_values().collect())
            }
            JournalRecord::Closures(edges) => {
                let mut seen = BTreeMap::new();
                for edge in edges {
                    let key = (edge.graph.clone(), edge.parent, edge.child);
                    if !tables.closures.contains_key(&key) {
                        seen.entry(key).or_insert(edge);
                    }
                }
                JournalRecord::Closures(seen.into_values().collect())
            }
        }
    }

    /// Filter out already-present rows, journal the remainder, then apply it.
    /// A batch is applied whole or not at all.
    async fn commit(&self, record: JournalRecord) -> StoreResult<usize> {
        let _commit = self.commit_lock.lock().await;
        let mut fresh = self.fresh(record);

        let count = match &fresh {
            JournalRecord::Nodes(rows) => rows.len(),
            JournalRecord::Closures(edges) => edges.len(),
        };
        if count == 0 {
            return Ok(0);
        }

        if let Some(journal) = &self.journal {
            let journal = Arc::clone(journal);
            fresh = tokio::task::spawn_blocking(move || journal.append(&fresh).map(|_| fresh))
                .await
                .map_err(|e| StoreError::Backend(format!("journal task failed: {e}")))??;
        }
        self.tables.write().expect("lock poisoned").apply(fresh);
        Ok(count)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("nodes", &self.len())
            .field("closures", &self.closure_len())
            .field("journal", &self.journal.as_ref().map(|j| j.path().to_path_buf()))
            .finish()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn insert_nodes(&self, rows: Vec<NodeRow>) -> StoreResult<usize> {
        let _conn = self.connection().await?;
        let requested = rows.len();
        let inserted = self.commit(JournalRecord::Nodes(rows)).await?;
        debug!(requested, inserted, "insert nodes");
        Ok(inserted)
    }

    async fn insert_closures(&self, edges: Vec<ClosureEdge>) -> StoreResult<usize> {
        let _conn = self.connection().await?;
        let requested = edges.len();
        let inserted = self.commit(JournalRecord::Closures(edges)).await?;
        debug!(requested, inserted, "insert closures");
        Ok(inserted)
    }

    async fn get_node(&self, graph: &GraphId, id: &ObjectId) -> StoreResult<Option<NodeRow>> {
        let _conn = self.connection().await?;
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.nodes.get(&(graph.clone(), *id)).cloned())
    }

    async fn get_nodes(&self, graph: &GraphId, ids: &[ObjectId]) -> StoreResult<Vec<NodeRow>> {
        let _conn = self.connection().await?;
        let mut wanted: Vec<ObjectId> = ids.to_vec();
        wanted.sort();
        wanted.dedup();
        let tables = self.tables.read().expect("lock poisoned");
        Ok(wanted
            .into_iter()
            .filter_map(|id| tables.nodes.get(&(graph.clone(), id)).cloned())
            .collect())
    }

    async fn children_page(
        &self,
        graph: &GraphId,
        parent: &ObjectId,
        query: &ChildrenQuery,
    ) -> StoreResult<Vec<ChildRow>> {
        let _conn = self.connection().await?;
        let start = match query.after {
            Some(after) => Bound::Excluded((graph.clone(), *parent, after)),
            None => Bound::Included((graph.clone(), *parent, ObjectId::null())),
        };
        let tables = self.tables.read().expect("lock poisoned");
        let rows = tables
            .closures
            .range((start, Bound::Unbounded))
            .take_while(|((g, p, _), _)| g == graph && p == parent)
            .filter(|(_, depth)| query.max_depth.map_or(true, |max| **depth <= max))
            .filter_map(|((g, _, child), depth)| {
                tables.nodes.get(&(g.clone(), *child)).map(|node| ChildRow {
                    min_depth: *depth,
                    node: node.clone(),
                })
            })
            .take(query.limit)
            .collect();
        Ok(rows)
    }

    async fn has_nodes(
        &self,
        graph: &GraphId,
        ids: &[ObjectId],
    ) -> StoreResult<BTreeMap<ObjectId, bool>> {
        let _conn = self.connection().await?;
        let tables = self.tables.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .map(|id| (*id, tables.nodes.contains_key(&(graph.clone(), *id))))
            .collect())
    }
}
