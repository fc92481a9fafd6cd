//! The producer-side object graph handed to the decomposer.
//!
//! A [`Node`] is a typed record with an ordered list of [`Field`]s. Each field
//! carries a [`FieldAnnotation`] chosen by the producer that decides whether
//! the field's value is embedded inline, detached into its own stored node, or
//! split into fixed-size [`DATA_CHUNK_TYPE`] nodes.
//!
//! Nested nodes are held behind [`Arc`] so a producer can share one subtree
//! between several parents (instances, shared definitions) without cloning it.

use std::sync::Arc;

use serde_json::{Map, Number};

/// Type discriminator used when a producer does not supply one.
pub const DEFAULT_NODE_TYPE: &str = "Base";

/// Type discriminator of the synthetic nodes produced by the chunker.
pub const DATA_CHUNK_TYPE: &str = "DataChunk";

/// How a field's value is laid out in the decomposed output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldAnnotation {
    /// Embedded verbatim (primitives) or fully expanded (nested nodes).
    #[default]
    Inline,
    /// Nested nodes are stored separately and replaced by references.
    Detached,
    /// Primitive arrays are split into detached chunks of the given size;
    /// `None` uses the decomposer's configured default.
    DetachedChunked(Option<usize>),
}

impl FieldAnnotation {
    /// Returns `true` for both detached variants.
    pub fn is_detached(&self) -> bool {
        !matches!(self, Self::Inline)
    }
}

/// A field value supplied by the producer.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    /// A typed nested node.
    Node(Arc<Node>),
    /// A structured value without a type discriminator. Producers must not
    /// hand these to the decomposer; it rejects them as a contract violation.
    Untyped(Map<String, serde_json::Value>),
}

impl Value {
    /// Scalars (including null) that are copied verbatim.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_)
        )
    }

    /// Absent values that are omitted from the output entirely.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Borrow the nested node, if this value is one.
    pub fn as_node(&self) -> Option<&Arc<Node>> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Convert a primitive into its JSON form. Returns `None` for arrays,
    /// nodes and untyped maps.
    pub fn primitive_to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Null => Some(serde_json::Value::Null),
            Self::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Self::Number(n) => Some(serde_json::Value::Number(n.clone())),
            Self::String(s) => Some(serde_json::Value::String(s.clone())),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Number(v.into())
    }
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Number::from_f64(v).map(Self::Number).unwrap_or(Self::Null)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Node> for Value {
    fn from(v: Node) -> Self {
        Self::Node(Arc::new(v))
    }
}

impl From<Arc<Node>> for Value {
    fn from(v: Arc<Node>) -> Self {
        Self::Node(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

/// A named, annotated field of a [`Node`].
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub annotation: FieldAnnotation,
    pub value: Value,
}

/// A typed record in the producer's object graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    type_name: String,
    fields: Vec<Field>,
}

impl Node {
    /// Create an empty node with the given type discriminator.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Create an empty node of the default type.
    pub fn base() -> Self {
        Self::new(DEFAULT_NODE_TYPE)
    }

    /// Build a data chunk holding the given primitives.
    pub fn data_chunk(values: Vec<Value>) -> Self {
        Self::new(DATA_CHUNK_TYPE).with("data", Value::Array(values))
    }

    /// Add an inline field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, FieldAnnotation::Inline, value);
        self
    }

    /// Add a detached field.
    pub fn with_detached(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, FieldAnnotation::Detached, value);
        self
    }

    /// Add a chunked primitive array field.
    pub fn with_chunked(
        mut self,
        name: impl Into<String>,
        chunk_size: Option<usize>,
        value: impl Into<Value>,
    ) -> Self {
        self.set(name, FieldAnnotation::DetachedChunked(chunk_size), value);
        self
    }

    /// Set a field, replacing any existing field of the same name in place.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        annotation: FieldAnnotation,
        value: impl Into<Value>,
    ) {
        let field = Field {
            name: name.into(),
            annotation,
            value: value.into(),
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
