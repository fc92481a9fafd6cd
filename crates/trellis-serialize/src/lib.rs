//! Turning a producer's object graph into stored nodes.
//!
//! The [`Decomposer`] walks a root [`Node`](trellis_types::Node) depth first.
//! Every detached descendant (and the root) becomes its own content-addressed
//! node and is handed to a [`Transport`](trellis_transport::Transport) as soon
//! as it is finalized; everything else is embedded inline in its parent. Along
//! the way each node accumulates its *closure*: the ids of all detached
//! descendants with the minimal number of detachment boundaries in between.
//!
//! Large primitive arrays on detached fields are split by the [`chunker`] into
//! `DataChunk` nodes of bounded size.
//!
//! [`json`] adapts plain JSON documents, with `@`-prefixed keys marking
//! detached fields, into producer nodes.

pub mod chunker;
pub mod config;
pub mod decomposer;
pub mod error;
pub mod json;

pub use chunker::chunk;
pub use config::SerializerConfig;
pub use decomposer::{Decomposer, WriteOutcome};
pub use error::{SerializeError, SerializeResult};
pub use json::node_from_json;
