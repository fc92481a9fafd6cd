use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trellis_crypto::{embed_id, ContentHasher};
use trellis_types::{
    depth_histogram, ClosureEdge, ClosureMap, GraphId, ObjectId, CLOSURE_KEY, DEFAULT_NODE_TYPE,
    ID_KEY, TYPE_KEY,
};

use crate::error::{StoreError, StoreResult};

/// A persisted node row, keyed by `(graph, id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    pub graph: GraphId,
    pub id: ObjectId,
    pub type_name: String,
    /// Serialized node, `id` included.
    pub body: String,
    pub total_children_count: u32,
    pub total_children_count_by_depth: BTreeMap<u32, u32>,
}

/// A serialized node as received at the ingestion boundary, with its
/// identity, type and closure pulled out of the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: ObjectId,
    pub type_name: String,
    pub body: String,
    pub closure: ClosureMap,
}

impl NodeRecord {
    /// Parse a serialized node, keeping the body text verbatim when it
    /// already carries an id and fits on one line. Multi-line bodies are
    /// re-encoded compactly so line framing stays one node per line.
    pub fn parse(body: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| StoreError::InvalidNode(format!("not JSON: {e}")))?;
        Self::build(value, Some(body))
    }

    /// Build from an already parsed JSON object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        Self::build(value, None)
    }

    fn build(value: Value, original: Option<&str>) -> StoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::InvalidNode("not a JSON object".into()))?;

        let type_name = match obj.get(TYPE_KEY) {
            None => DEFAULT_NODE_TYPE.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(StoreError::InvalidNode(format!(
                    "type must be a string, got {other}"
                )))
            }
        };

        let closure = match obj.get(CLOSURE_KEY) {
            None | Some(Value::Null) => ClosureMap::new(),
            Some(Value::Object(entries)) => {
                let mut closure = ClosureMap::new();
                for (child, depth) in entries {
                    let child = ObjectId::from_hex(child)
                        .map_err(|e| StoreError::InvalidNode(format!("closure key {child}: {e}")))?;
                    let depth = depth
                        .as_u64()
                        .and_then(|d| u32::try_from(d).ok())
                        .ok_or_else(|| {
                            StoreError::InvalidNode(format!("closure depth for {child}: {depth}"))
                        })?;
                    closure.insert(child, depth);
                }
                closure
            }
            Some(other) => {
                return Err(StoreError::InvalidNode(format!(
                    "closure must be an object, got {other}"
                )))
            }
        };

        let (id, body) = match obj.get(ID_KEY) {
            Some(Value::String(hex)) => {
                let id = ObjectId::from_hex(hex)
                    .map_err(|e| StoreError::InvalidNode(format!("id {hex}: {e}")))?;
                let body = match original {
                    Some(text) if !text.contains(|c: char| c == '\n' || c == '\r') => text.to_string(),
                    _ => serde_json::to_string(&value)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?,
                };
                (id, body)
            }
            None => {
                // Unhashed input: mint the id the same way the decomposer does.
                let (id, canonical) = ContentHasher::NODE
                    .hash_canonical(&value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                let body = String::from_utf8(embed_id(&canonical, &id))
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                (id, body)
            }
            Some(other) => {
                return Err(StoreError::InvalidNode(format!(
                    "id must be a string, got {other}"
                )))
            }
        };

        Ok(Self {
            id,
            type_name,
            body,
            closure,
        })
    }

    /// Serialized size used by the size guard.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Split into the node row and its closure edges for `graph`.
    pub fn into_row(self, graph: &GraphId) -> (NodeRow, Vec<ClosureEdge>) {
        let edges = ClosureEdge::from_closure(graph, self.id, &self.closure);
        let row = NodeRow {
            graph: graph.clone(),
            id: self.id,
            type_name: self.type_name,
            body: self.body,
            total_children_count: self.closure.len() as u32,
            total_children_count_by_depth: depth_histogram(&self.closure),
        };
        (row, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> GraphId {
        GraphId::new("g1").unwrap()
    }

    #[test]
    fn parse_keeps_body_verbatim() {
        let id = ObjectId::from_bytes(b"n");
        let body = format!(r#"{{"id":"{}","type":"Wall","height":3}}"#, id.to_hex());
        let record = NodeRecord::parse(&body).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.type_name, "Wall");
        assert_eq!(record.body, body);
        assert!(record.closure.is_empty());
    }

    #[test]
    fn multi_line_body_is_compacted() {
        let id = ObjectId::from_bytes(b"n");
        let body = format!(
            "{{\n  \"id\": \"{}\",\n  \"note\": \"a\\nb\"\r\n}}",
            id.to_hex()
        );
        let record = NodeRecord::parse(&body).unwrap();
        assert_eq!(record.id, id);
        assert!(!record.body.contains('\n') && !record.body.contains('\r'));
        let reparsed: Value = serde_json::from_str(&record.body).unwrap();
        assert_eq!(reparsed["note"], "a\nb");
    }

    #[test]
    fn missing_type_defaults_to_base() {
        let id = ObjectId::from_bytes(b"n");
        let record = NodeRecord::from_value(json!({"id": id.to_hex()})).unwrap();
        assert_eq!(record.type_name, DEFAULT_NODE_TYPE);
    }

    #[test]
    fn missing_id_is_computed() {
        let value = json!({"type": "Base", "a": 1});
        let record = NodeRecord::from_value(value.clone()).unwrap();
        let (expected, _) = ContentHasher::NODE.hash_canonical(&value).unwrap();
        assert_eq!(record.id, expected);
        let body: Value = serde_json::from_str(&record.body).unwrap();
        assert_eq!(body["id"], expected.to_hex());
        assert_eq!(body["a"], 1);
    }

    #[test]
    fn closure_is_extracted() {
        let a = ObjectId::from_bytes(b"a");
        let b = ObjectId::from_bytes(b"b");
        let record = NodeRecord::from_value(json!({
            "id": ObjectId::from_bytes(b"p").to_hex(),
            "__closure": { a.to_hex(): 0, b.to_hex(): 1 },
            "totalChildrenCount": 2,
        }))
        .unwrap();
        assert_eq!(record.closure.get(&a), Some(&0));
        assert_eq!(record.closure.get(&b), Some(&1));

        let (row, edges) = record.into_row(&graph());
        assert_eq!(row.total_children_count, 2);
        assert_eq!(row.total_children_count_by_depth.get(&0), Some(&1));
        assert_eq!(row.total_children_count_by_depth.get(&1), Some(&1));
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.parent == row.id && e.graph == graph()));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            NodeRecord::parse("[1,2]"),
            Err(StoreError::InvalidNode(_))
        ));
        assert!(matches!(
            NodeRecord::parse("not json"),
            Err(StoreError::InvalidNode(_))
        ));
    }

    #[test]
    fn rejects_bad_ids_and_depths() {
        assert!(NodeRecord::from_value(json!({"id": "xyz"})).is_err());
        assert!(NodeRecord::from_value(json!({"id": 12})).is_err());
        let id = ObjectId::from_bytes(b"p").to_hex();
        assert!(NodeRecord::from_value(json!({"id": id, "__closure": {"nothex": 1}})).is_err());
        let child = ObjectId::from_bytes(b"c").to_hex();
        assert!(NodeRecord::from_value(json!({"id": id, "__closure": {child: -1}})).is_err());
    }
}
