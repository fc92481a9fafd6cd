//! Delivery of serialized nodes from a decomposition to a store.
//!
//! A [`Transport`] accepts nodes one at a time as the decomposer finalizes
//! them. [`BatchingTransport`] buffers them and hands full buffers to a
//! [`BatchSink`] as one atomic batch; [`StoreSink`] is the in-process sink
//! that feeds a [`trellis_store::BatchWriter`].
//!
//! A failed delivery leaves the buffer untouched. Because nodes are content
//! addressed and the store inserts "if absent", the caller can simply call
//! [`Transport::flush`] again.

pub mod batching;
pub mod config;
pub mod error;
pub mod memory;
pub mod sink;
pub mod traits;

pub use batching::{BatchingTransport, TransportStats};
pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use memory::MemoryTransport;
pub use sink::StoreSink;
pub use traits::{BatchSink, Transport};
