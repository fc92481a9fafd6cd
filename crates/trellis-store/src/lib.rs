//! Deduplicating node and closure storage for Trellis.
//!
//! The store persists two kinds of rows, both scoped to a [`GraphId`]:
//!
//! - **nodes**, keyed by `(graph, id)`, carrying the type, the serialized body
//!   and the closure-derived counts;
//! - **closure edges**, keyed by `(graph, parent, child)`, carrying the minimal
//!   detachment depth between the two.
//!
//! # Design Rules
//!
//! 1. Every insert is "insert if absent". Writing the same content twice is a
//!    no-op, never an overwrite and never an error.
//! 2. Ids are content-derived, so re-running a failed batch is always safe.
//! 3. Rows are written in bounded batches, each inside one short transaction,
//!    node batches before the closure batches that point at them.
//! 4. The backend's connection pool is acquired per batch and released on
//!    every exit path.
//! 5. Oversized nodes are rejected before anything is written.
//!
//! [`GraphId`]: trellis_types::GraphId

pub mod config;
pub mod error;
pub mod journal;
pub mod memory;
pub mod record;
pub mod traits;
pub mod writer;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use journal::{Journal, JournalConfig, JournalRecord, SyncMode};
pub use memory::InMemoryObjectStore;
pub use record::{NodeRecord, NodeRow};
pub use traits::{ChildRow, ChildrenQuery, ObjectStore};
pub use writer::{BatchWriter, WriteSummary};
