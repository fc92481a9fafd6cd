use std::io::Write;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};

use crate::error::RetrieveError;
use crate::retriever::ByteStream;

/// Gzip a byte stream chunk by chunk. The gzip trailer is emitted once the
/// input ends; an input error ends the output after being passed on.
pub fn gzip(input: ByteStream) -> ByteStream {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    Box::pin(stream::unfold(
        Some((input, encoder)),
        |state| async move {
            let (mut input, mut encoder) = state?;
            loop {
                match input.next().await {
                    Some(Ok(chunk)) => {
                        if let Err(e) = encoder.write_all(&chunk) {
                            return Some((Err(RetrieveError::from(e)), None));
                        }
                        let compressed = std::mem::take(encoder.get_mut());
                        if !compressed.is_empty() {
                            return Some((Ok(Bytes::from(compressed)), Some((input, encoder))));
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        return Some((
                            encoder.finish().map(Bytes::from).map_err(RetrieveError::from),
                            None,
                        ))
                    }
                }
            }
        },
    ))
}
