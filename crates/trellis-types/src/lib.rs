//! Foundation types for Trellis.
//!
//! Trellis stores arbitrarily nested object graphs as immutable,
//! content-addressed nodes. This crate holds the vocabulary shared by every
//! other crate in the workspace.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed node identifier (BLAKE3 hash)
//! - [`GraphId`]: The logical graph (project/stream) a node is scoped to
//! - [`Node`] / [`Value`] / [`FieldAnnotation`]: The producer-side object graph
//! - [`Reference`]: Placeholder substituted for a detached child
//! - [`ClosureEdge`] / [`ClosureMap`]: Ancestor → detached-descendant facts

pub mod closure;
pub mod error;
pub mod graph;
pub mod node;
pub mod object;

pub use closure::{depth_histogram, ClosureEdge, ClosureMap, Reference};
pub use error::TypeError;
pub use graph::GraphId;
pub use node::{Field, FieldAnnotation, Node, Value, DATA_CHUNK_TYPE, DEFAULT_NODE_TYPE};
pub use object::ObjectId;

/// Key under which a serialized node carries its own id.
pub const ID_KEY: &str = "id";
/// Key under which a serialized node carries its type discriminator.
pub const TYPE_KEY: &str = "type";
/// Key under which a serialized node carries its closure map.
pub const CLOSURE_KEY: &str = "__closure";
/// Key under which a serialized node carries the size of its closure.
pub const TOTAL_CHILDREN_COUNT_KEY: &str = "totalChildrenCount";
