use trellis_store::StoreError;

/// Errors from delivering nodes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A batch could not be delivered. The buffer still holds it.
    #[error("failed to deliver batch of {batch_len} nodes: {reason}")]
    Delivery { batch_len: usize, reason: String },

    /// The sink's store rejected the batch.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Any other sink failure.
    #[error("sink error: {0}")]
    Sink(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
