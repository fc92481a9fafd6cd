use std::num::NonZeroUsize;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value as Json};
use tracing::{debug, info};
use trellis_crypto::{embed_id, ContentHasher, HasherError};
use trellis_transport::Transport;
use trellis_types::{
    ClosureMap, Field, FieldAnnotation, Node, ObjectId, Reference, Value, CLOSURE_KEY, ID_KEY,
    TOTAL_CHILDREN_COUNT_KEY, TYPE_KEY,
};

use crate::chunker::chunk;
use crate::config::SerializerConfig;
use crate::error::{SerializeError, SerializeResult};

/// Result of decomposing one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub root_id: ObjectId,
    /// The root's closure: every detached descendant with its minimal depth.
    pub closure: ClosureMap,
    /// Nodes handed to the transport, root included. Shared subtrees are
    /// counted once per occurrence.
    pub nodes_written: usize,
}

/// An open ancestor on the lineage stack.
struct Frame {
    /// Address of the node being traversed, for cycle detection.
    addr: usize,
    /// Detachment boundaries from the root down to this node, the root
    /// counting as one.
    boundaries: u32,
    /// Detached descendants seen so far, keyed to the boundary count of the
    /// frame that was on top when they were spliced in.
    closure: ClosureMap,
}

struct Finalized {
    id: ObjectId,
    /// The node's record with its id, as embedded inline by a parent.
    record: Json,
}

/// Depth-first decomposition of a node graph into content-addressed nodes.
///
/// A decomposer exclusively borrows its transport and owns the traversal
/// state of one `write` at a time; decompose different roots concurrently by
/// giving each its own decomposer.
pub struct Decomposer<'t, T: ?Sized> {
    transport: &'t mut T,
    config: SerializerConfig,
    lineage: Vec<Frame>,
    written: usize,
}

impl<'t, T: Transport + ?Sized> Decomposer<'t, T> {
    pub fn new(transport: &'t mut T, config: SerializerConfig) -> Self {
        Self {
            transport,
            config,
            lineage: Vec::new(),
            written: 0,
        }
    }

    /// Decompose `root`, emitting every detached node and the root to the
    /// transport, then flush it.
    ///
    /// Nodes are emitted as they are finalized, so children always precede
    /// the parents that reference them. On error, nodes emitted so far may
    /// already have been delivered; they are harmless duplicates to a retry.
    pub async fn write(&mut self, root: &Node) -> SerializeResult<WriteOutcome> {
        self.lineage.clear();
        self.written = 0;

        let mut root_closure = ClosureMap::new();
        let root = self
            .traverse(root, true, "$".to_string(), Some(&mut root_closure))
            .await?;
        self.transport.flush().await?;

        info!(
            root = %root.id.short_hex(),
            nodes = self.written,
            closure = root_closure.len(),
            "decomposition complete"
        );
        Ok(WriteOutcome {
            root_id: root.id,
            closure: root_closure,
            nodes_written: self.written,
        })
    }

    /// Traverse one node. `detached` nodes are emitted; the root is always
    /// traversed as detached. When `closure_out` is given, the node's
    /// normalized closure is copied into it.
    fn traverse<'a>(
        &'a mut self,
        node: &'a Node,
        detached: bool,
        path: String,
        closure_out: Option<&'a mut ClosureMap>,
    ) -> BoxFuture<'a, SerializeResult<Finalized>> {
        async move {
            // `Node` is immutable and children are held by `Arc`, so a graph
            // built through the public API cannot contain itself. Shared
            // subtrees sit on separate branches and never match here.
            let addr = node as *const Node as usize;
            if self.lineage.iter().any(|frame| frame.addr == addr) {
                return Err(SerializeError::violation(path, "node is its own ancestor"));
            }
            let boundaries = match self.lineage.last() {
                None => 1,
                Some(parent) => parent.boundaries + u32::from(detached),
            };
            let level = self.lineage.len();
            self.lineage.push(Frame {
                addr,
                boundaries,
                closure: ClosureMap::new(),
            });

            let mut record = Map::new();
            record.insert(TYPE_KEY.into(), Json::String(node.type_name().to_string()));
            for field in node.fields() {
                if is_skipped(field) {
                    continue;
                }
                let field_path = format!("{path}.{}", field.name);
                if field.name == TOTAL_CHILDREN_COUNT_KEY {
                    return Err(SerializeError::violation(field_path, "reserved field name"));
                }
                let value = self.field_value(field, field_path).await?;
                record.insert(field.name.clone(), value);
            }

            let frame = self.lineage.remove(level);
            let closure: ClosureMap = frame
                .closure
                .into_iter()
                .map(|(id, depth)| (id, depth.saturating_sub(frame.boundaries)))
                .collect();
            if !closure.is_empty() {
                record.insert(TOTAL_CHILDREN_COUNT_KEY.into(), json!(closure.len()));
                let entries: Map<String, Json> = closure
                    .iter()
                    .map(|(id, depth)| (id.to_hex(), json!(depth)))
                    .collect();
                record.insert(CLOSURE_KEY.into(), Json::Object(entries));
            }

            let mut value = Json::Object(record);
            let (id, canonical) = ContentHasher::NODE.hash_canonical(&value)?;

            if detached {
                if let Some(depth) = self.lineage.last().map(|top| top.boundaries) {
                    for open in &mut self.lineage {
                        open.closure
                            .entry(id)
                            .and_modify(|d| *d = (*d).min(depth))
                            .or_insert(depth);
                    }
                }
                let body = String::from_utf8(embed_id(&canonical, &id))
                    .map_err(|e| HasherError::Serialization(e.to_string()))?;
                let size = body.len();
                debug!(id = %id.short_hex(), size, path = %path, "emit node");
                self.transport.write(body, size).await?;
                self.written += 1;
            }

            if let Json::Object(map) = &mut value {
                map.insert(ID_KEY.into(), Json::String(id.to_hex()));
            }
            if let Some(out) = closure_out {
                *out = closure;
            }
            Ok(Finalized { id, record: value })
        }
        .boxed()
    }

    /// Lay out one field according to its annotation.
    fn field_value<'a>(
        &'a mut self,
        field: &'a Field,
        path: String,
    ) -> BoxFuture<'a, SerializeResult<Json>> {
        async move {
            match (&field.annotation, &field.value) {
                (
                    FieldAnnotation::Detached | FieldAnnotation::DetachedChunked(_),
                    Value::Array(items),
                ) if items.iter().all(Value::is_primitive) => {
                    let size = match field.annotation {
                        FieldAnnotation::DetachedChunked(Some(size)) => size,
                        _ => self.config.chunk_size,
                    };
                    self.chunked(items, size, path).await
                }
                (annotation, value) => self.convert(value, annotation.is_detached(), path).await,
            }
        }
        .boxed()
    }

    /// Split a primitive array into detached chunks and return the ordered
    /// list of references to them.
    fn chunked<'a>(
        &'a mut self,
        items: &'a [Value],
        size: usize,
        path: String,
    ) -> BoxFuture<'a, SerializeResult<Json>> {
        async move {
            let size = NonZeroUsize::new(size)
                .ok_or_else(|| SerializeError::violation(&path, "chunk size must be at least 1"))?;
            let chunks = chunk(items, size);
            let mut refs = Vec::with_capacity(chunks.len());
            for (i, data_chunk) in chunks.iter().enumerate() {
                let done = self
                    .traverse(data_chunk, true, format!("{path}#{i}"), None)
                    .await?;
                refs.push(Reference::new(done.id).to_json());
            }
            Ok(Json::Array(refs))
        }
        .boxed()
    }

    /// Convert a value. Nested nodes are detached (replaced by a reference)
    /// or embedded fully expanded. Arrays are walked in order.
    fn convert<'a>(
        &'a mut self,
        value: &'a Value,
        detached: bool,
        path: String,
    ) -> BoxFuture<'a, SerializeResult<Json>> {
        async move {
            match value {
                Value::Node(child) => {
                    let done = self.traverse(child, detached, path, None).await?;
                    Ok(if detached {
                        Reference::new(done.id).to_json()
                    } else {
                        done.record
                    })
                }
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        out.push(self.convert(item, detached, format!("{path}[{i}]")).await?);
                    }
                    Ok(Json::Array(out))
                }
                Value::Untyped(_) => Err(SerializeError::violation(
                    path,
                    "structured value without a type",
                )),
                primitive => primitive
                    .primitive_to_json()
                    .ok_or_else(|| SerializeError::violation(path, "unsupported value")),
            }
        }
        .boxed()
    }
}

/// Identity fields, private fields and empty values never reach the output.
fn is_skipped(field: &Field) -> bool {
    field.name == ID_KEY
        || field.name == TYPE_KEY
        || field.name.starts_with('_')
        || field.value.is_empty()
}
