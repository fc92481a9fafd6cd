//! Splitting primitive arrays into `DataChunk` nodes.

use std::num::NonZeroUsize;

use trellis_types::{Node, Value};

/// Split `values` into contiguous `DataChunk` nodes of at most `size`
/// elements each, preserving order. Only the last chunk may be shorter.
/// Empty input yields no chunks.
pub fn chunk(values: &[Value], size: NonZeroUsize) -> Vec<Node> {
    values
        .chunks(size.get())
        .map(|group| Node::data_chunk(group.to_vec()))
        .collect()
}
