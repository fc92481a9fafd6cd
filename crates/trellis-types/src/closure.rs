use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::graph::GraphId;
use crate::object::ObjectId;

/// Detached descendant id → minimal number of detachment boundaries between
/// the owning node and that descendant.
pub type ClosureMap = BTreeMap<ObjectId, u32>;

/// Placeholder substituted for a detached child.
///
/// Serialized as `{"referencedId": "<hex>", "kind": "reference"}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    pub referenced_id: ObjectId,
}

impl Reference {
    pub const KIND: &'static str = "reference";

    pub fn new(referenced_id: ObjectId) -> Self {
        Self { referenced_id }
    }

    /// The JSON form embedded in the parent's body.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "referencedId": self.referenced_id.to_hex(),
            "kind": Self::KIND,
        })
    }

    /// Recognize a reference in a serialized body.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get("kind")?.as_str()? != Self::KIND {
            return None;
        }
        let id = ObjectId::from_hex(obj.get("referencedId")?.as_str()?).ok()?;
        Some(Self::new(id))
    }
}

/// One persisted ancestor → detached-descendant relationship.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClosureEdge {
    pub graph: GraphId,
    pub parent: ObjectId,
    pub child: ObjectId,
    pub min_depth: u32,
}

impl ClosureEdge {
    /// Primary key ordering: `(graph, parent, child)`.
    pub fn key(&self) -> (&GraphId, &ObjectId, &ObjectId) {
        (&self.graph, &self.parent, &self.child)
    }

    /// Expand a node's closure map into edges scoped to `graph`.
    pub fn from_closure(graph: &GraphId, parent: ObjectId, closure: &ClosureMap) -> Vec<Self> {
        closure
            .iter()
            .map(|(child, depth)| Self {
                graph: graph.clone(),
                parent,
                child: *child,
                min_depth: *depth,
            })
            .collect()
    }
}

/// Count closure entries per depth (`totalChildrenCountByDepth`).
pub fn depth_histogram(closure: &ClosureMap) -> BTreeMap<u32, u32> {
    let mut histogram = BTreeMap::new();
    for depth in closure.values() {
        *histogram.entry(*depth).or_insert(0) += 1;
    }
    histogram
}
