//! Streaming a stored node and its closure back out.
//!
//! The [`Retriever`] looks the root up, then pages through its closure in id
//! order. Rows flow to the consumer through a bounded channel, so at most
//! one page plus [`RetrieveConfig::high_water_mark`] rows are held in memory
//! no matter how large the closure is. A [`Framer`] turns rows into either
//! tab-separated lines or one incrementally emitted JSON array, and
//! [`gzip`] optionally compresses the framed bytes.

pub mod compress;
pub mod config;
pub mod error;
pub mod framing;
pub mod retriever;

pub use compress::gzip;
pub use config::RetrieveConfig;
pub use error::{RetrieveError, RetrieveResult};
pub use framing::{frame_stream, Framer, Framing};
pub use retriever::{ByteStream, NodeStream, Retriever};
