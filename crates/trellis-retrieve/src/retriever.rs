use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use trellis_store::{ChildrenQuery, NodeRow, ObjectStore};
use trellis_types::{GraphId, ObjectId};

use crate::config::RetrieveConfig;
use crate::error::RetrieveResult;
use crate::framing::{frame_stream, Framing};

pub type NodeStream = Pin<Box<dyn Stream<Item = RetrieveResult<NodeRow>> + Send>>;
pub type ByteStream = Pin<Box<dyn Stream<Item = RetrieveResult<Bytes>> + Send>>;

/// Reads nodes and closures back out of a store.
///
/// Streams are fed by a background task that pages through the store and
/// pushes rows into a channel of [`RetrieveConfig::high_water_mark`] slots.
/// The task suspends while the channel is full and stops as soon as the
/// consumer drops the stream.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn ObjectStore>,
    config: RetrieveConfig,
}

impl Retriever {
    pub fn new(store: Arc<dyn ObjectStore>, config: RetrieveConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetrieveConfig {
        &self.config
    }

    /// The root's raw stored body, or `None` if it is absent.
    pub async fn get_single(&self, graph: &GraphId, id: &ObjectId) -> RetrieveResult<Option<String>> {
        Ok(self.store.get_node(graph, id).await?.map(|row| row.body))
    }

    /// The root row followed by every closure row, in child id order.
    ///
    /// `max_depth` limits the closure to descendants at most that many
    /// detachment boundaries away. Returns `None` if the root is absent.
    pub async fn stream_closure(
        &self,
        graph: &GraphId,
        id: &ObjectId,
        max_depth: Option<u32>,
    ) -> RetrieveResult<Option<NodeStream>> {
        let Some(root) = self.store.get_node(graph, id).await? else {
            return Ok(None);
        };

        let (tx, rx) = mpsc::channel::<RetrieveResult<NodeRow>>(self.config.high_water_mark.max(1));
        let store = Arc::clone(&self.store);
        let graph = graph.clone();
        let root_id = root.id;
        let page_size = self.config.page_size.max(1);

        tokio::spawn(async move {
            if tx.send(Ok(root)).await.is_err() {
                return;
            }
            let mut query = ChildrenQuery {
                max_depth,
                ..ChildrenQuery::first(page_size)
            };
            let mut sent = 0usize;
            loop {
                let page = match store.children_page(&graph, &root_id, &query).await {
                    Ok(page) => page,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                let exhausted = page.len() < page_size;
                query.after = page.last().map(|row| row.node.id);
                for row in page {
                    if tx.send(Ok(row.node)).await.is_err() {
                        debug!(root = %root_id.short_hex(), sent, "closure consumer went away");
                        return;
                    }
                    sent += 1;
                }
                if exhausted || query.after.is_none() {
                    break;
                }
            }
            debug!(root = %root_id.short_hex(), sent, "closure stream complete");
        });

        Ok(Some(Box::pin(ReceiverStream::new(rx))))
    }

    /// Framed bytes of [`Retriever::stream_closure`].
    pub async fn stream(
        &self,
        graph: &GraphId,
        id: &ObjectId,
        framing: Framing,
    ) -> RetrieveResult<Option<ByteStream>> {
        Ok(self
            .stream_closure(graph, id, None)
            .await?
            .map(|rows| frame_stream(rows, framing)))
    }

    /// The present subset of `ids`, in id order. Absent ids are skipped.
    pub fn stream_nodes(&self, graph: &GraphId, mut ids: Vec<ObjectId>) -> NodeStream {
        ids.sort();
        ids.dedup();

        let (tx, rx) = mpsc::channel::<RetrieveResult<NodeRow>>(self.config.high_water_mark.max(1));
        let store = Arc::clone(&self.store);
        let graph = graph.clone();
        let page_size = self.config.page_size.max(1);

        tokio::spawn(async move {
            for batch in ids.chunks(page_size) {
                let rows = match store.get_nodes(&graph, batch).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                for row in rows {
                    if tx.send(Ok(row)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_store::{ChildRow, InMemoryObjectStore, StoreResult};
    use trellis_types::ClosureEdge;

    fn graph() -> GraphId {
        GraphId::new("retrieve").unwrap()
    }

    fn row(tag: &str, children: u32) -> NodeRow {
        NodeRow {
            graph: graph(),
            id: ObjectId::from_bytes(tag.as_bytes()),
            type_name: "Base".into(),
            body: format!(r#"{{"tag":"{tag}"}}"#),
            total_children_count: children,
            total_children_count_by_depth: BTreeMap::new(),
        }
    }

    /// Root with `n` children at depths alternating 0 and 1.
    async fn seeded(n: usize) -> (Arc<InMemoryObjectStore>, NodeRow, Vec<NodeRow>) {
        let store = Arc::new(InMemoryObjectStore::new());
        let root = row("root", n as u32);
        let children: Vec<NodeRow> = (0..n).map(|i| row(&format!("child-{i}"), 0)).collect();
        store.insert_nodes(vec![root.clone()]).await.unwrap();
        for batch in children.chunks(500) {
            store.insert_nodes(batch.to_vec()).await.unwrap();
        }
        let edges: Vec<ClosureEdge> = children
            .iter()
            .enumerate()
            .map(|(i, c)| ClosureEdge {
                graph: graph(),
                parent: root.id,
                child: c.id,
                min_depth: (i % 2) as u32,
            })
            .collect();
        for batch in edges.chunks(1000) {
            store.insert_closures(batch.to_vec()).await.unwrap();
        }
        (store, root, children)
    }

    /// Counts closure rows handed out by the store.
    struct CountingStore {
        inner: Arc<InMemoryObjectStore>,
        rows_read: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn insert_nodes(&self, rows: Vec<NodeRow>) -> StoreResult<usize> {
            self.inner.insert_nodes(rows).await
        }

        async fn insert_closures(&self, edges: Vec<ClosureEdge>) -> StoreResult<usize> {
            self.inner.insert_closures(edges).await
        }

        async fn get_node(&self, graph: &GraphId, id: &ObjectId) -> StoreResult<Option<NodeRow>> {
            self.inner.get_node(graph, id).await
        }

        async fn get_nodes(&self, graph: &GraphId, ids: &[ObjectId]) -> StoreResult<Vec<NodeRow>> {
            self.inner.get_nodes(graph, ids).await
        }

        async fn children_page(
            &self,
            graph: &GraphId,
            parent: &ObjectId,
            query: &ChildrenQuery,
        ) -> StoreResult<Vec<ChildRow>> {
            let page = self.inner.children_page(graph, parent, query).await?;
            self.rows_read.fetch_add(page.len(), Ordering::SeqCst);
            Ok(page)
        }
    }

    #[tokio::test]
    async fn single_returns_raw_body() {
        let (store, root, _) = seeded(3).await;
        let retriever = Retriever::new(store, RetrieveConfig::default());
        assert_eq!(
            retriever.get_single(&graph(), &root.id).await.unwrap(),
            Some(root.body)
        );
        assert_eq!(
            retriever
                .get_single(&graph(), &ObjectId::from_bytes(b"missing"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn missing_root_is_none() {
        let store = Arc::new(InMemoryObjectStore::new());
        let retriever = Retriever::new(store, RetrieveConfig::default());
        let stream = retriever
            .stream(&graph(), &ObjectId::from_bytes(b"missing"), Framing::Lines)
            .await
            .unwrap();
        assert!(stream.is_none());
    }

    #[tokio::test]
    async fn root_first_then_children_in_id_order() {
        let (store, root, children) = seeded(450).await;
        let config = RetrieveConfig {
            page_size: 100,
            high_water_mark: 8,
        };
        let retriever = Retriever::new(store, config);
        let rows: Vec<NodeRow> = retriever
            .stream_closure(&graph(), &root.id, None)
            .await
            .unwrap()
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(rows.len(), 451);
        assert_eq!(rows[0].id, root.id);
        let mut expected: Vec<ObjectId> = children.iter().map(|c| c.id).collect();
        expected.sort();
        let got: Vec<ObjectId> = rows[1..].iter().map(|r| r.id).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn page_boundary_is_not_duplicated() {
        let (store, root, _) = seeded(200).await;
        let config = RetrieveConfig {
            page_size: 100,
            high_water_mark: 4,
        };
        let retriever = Retriever::new(store, config);
        let count = retriever
            .stream_closure(&graph(), &root.id, None)
            .await
            .unwrap()
            .unwrap()
            .count()
            .await;
        assert_eq!(count, 201);
    }

    #[tokio::test]
    async fn depth_limit_filters_children() {
        let (store, root, _) = seeded(10).await;
        let retriever = Retriever::new(store, RetrieveConfig::default());
        let count = retriever
            .stream_closure(&graph(), &root.id, Some(0))
            .await
            .unwrap()
            .unwrap()
            .count()
            .await;
        assert_eq!(count, 1 + 5);
    }

    #[tokio::test]
    async fn json_array_of_closure_parses() {
        let (store, root, _) = seeded(5).await;
        let retriever = Retriever::new(store, RetrieveConfig::default());
        let chunks: Vec<Bytes> = retriever
            .stream(&graph(), &root.id, Framing::JsonArray)
            .await
            .unwrap()
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        let parsed: serde_json::Value = serde_json::from_slice(&chunks.concat()).unwrap();
        let nodes = parsed.as_array().unwrap();
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes[0]["tag"], "root");
    }

    #[tokio::test]
    async fn large_closure_streams_with_bounded_window() {
        let (inner, root, _) = seeded(10_000).await;
        let store = Arc::new(CountingStore {
            inner,
            rows_read: AtomicUsize::new(0),
        });
        let config = RetrieveConfig {
            page_size: 200,
            high_water_mark: 64,
        };
        let retriever = Retriever::new(store.clone(), config.clone());
        let mut stream = retriever
            .stream_closure(&graph(), &root.id, None)
            .await
            .unwrap()
            .unwrap();

        // Consume slowly: the reader may only run ahead by what fits in the
        // channel plus the page it is currently pushing.
        let mut consumed = 0usize;
        let window = config.page_size + config.high_water_mark + 1;
        while let Some(row) = stream.next().await {
            row.unwrap();
            consumed += 1;
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            let read = store.rows_read.load(Ordering::SeqCst);
            assert!(
                read <= consumed + window,
                "read {read} rows with only {consumed} consumed"
            );
        }
        assert_eq!(consumed, 10_001);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_reader() {
        let (inner, root, _) = seeded(2_000).await;
        let store = Arc::new(CountingStore {
            inner,
            rows_read: AtomicUsize::new(0),
        });
        let config = RetrieveConfig {
            page_size: 100,
            high_water_mark: 16,
        };
        let retriever = Retriever::new(store.clone(), config);
        let mut stream = retriever
            .stream_closure(&graph(), &root.id, None)
            .await
            .unwrap()
            .unwrap();
        stream.next().await.unwrap().unwrap();
        drop(stream);
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert!(store.rows_read.load(Ordering::SeqCst) <= 200);
    }

    #[tokio::test]
    async fn stream_nodes_skips_missing() {
        let (store, root, children) = seeded(3).await;
        let retriever = Retriever::new(store, RetrieveConfig::default());
        let ids = vec![
            children[2].id,
            ObjectId::from_bytes(b"missing"),
            root.id,
            children[2].id,
        ];
        let rows: Vec<NodeRow> = retriever
            .stream_nodes(&graph(), ids)
            .map(|r| r.unwrap())
            .collect()
            .await;
        let mut expected = vec![children[2].id, root.id];
        expected.sort();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn pretty_printed_upload_streams_as_one_line_per_node() {
        use trellis_store::{BatchWriter, StoreConfig};

        let store = Arc::new(InMemoryObjectStore::new());
        let writer = BatchWriter::new(store.clone(), StoreConfig::default());
        let child = ObjectId::from_bytes(b"child");
        let root = ObjectId::from_bytes(b"root");
        let child_body = format!("{{\n  \"id\": \"{}\",\n  \"x\": 1\n}}", child.to_hex());
        let root_body = format!(
            "{{\n  \"id\": \"{}\",\n  \"__closure\": {{\"{}\": 0}}\n}}",
            root.to_hex(),
            child.to_hex()
        );
        writer
            .write_serialized(&graph(), &[child_body, root_body])
            .await
            .unwrap();

        let chunks: Vec<Bytes> = Retriever::new(store, RetrieveConfig::default())
            .stream(&graph(), &root, Framing::Lines)
            .await
            .unwrap()
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        let text = String::from_utf8(chunks.concat()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("{}\t", root.to_hex())));
        let (_, body) = lines[1].split_once('\t').unwrap();
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["x"], 1);
    }
}
