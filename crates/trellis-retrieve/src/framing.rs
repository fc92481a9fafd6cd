use bytes::Bytes;
use futures::stream::{self, StreamExt};
use trellis_store::NodeRow;

use crate::retriever::{ByteStream, NodeStream};

/// Output layout of a node stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// One `"{id}\t{body}\n"` record per node.
    Lines,
    /// A single JSON array of node bodies.
    JsonArray,
}

impl Framing {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Lines => "text/plain; charset=utf-8",
            Self::JsonArray => "application/json",
        }
    }

    fn opening(&self) -> Option<Bytes> {
        match self {
            Self::Lines => None,
            Self::JsonArray => Some(Bytes::from_static(b"[")),
        }
    }

    fn closing(&self) -> Option<Bytes> {
        match self {
            Self::Lines => None,
            Self::JsonArray => Some(Bytes::from_static(b"]")),
        }
    }
}

/// Frames rows one at a time. Only remembers whether a row was emitted yet.
#[derive(Debug)]
pub struct Framer {
    framing: Framing,
    first: bool,
}

impl Framer {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            first: true,
        }
    }

    pub fn frame(&mut self, row: &NodeRow) -> Bytes {
        let framed = match self.framing {
            Framing::Lines => format!("{}\t{}\n", row.id.to_hex(), row.body),
            Framing::JsonArray if self.first => row.body.clone(),
            Framing::JsonArray => format!(",{}", row.body),
        };
        self.first = false;
        Bytes::from(framed)
    }
}

/// Frame a node stream. Errors pass through unchanged.
pub fn frame_stream(rows: NodeStream, framing: Framing) -> ByteStream {
    let mut framer = Framer::new(framing);
    let opening = stream::iter(framing.opening().map(Ok));
    let body = rows.map(move |row| row.map(|row| framer.frame(&row)));
    let closing = stream::iter(framing.closing().map(Ok));
    Box::pin(opening.chain(body).chain(closing))
}
