use trellis_types::ObjectId;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An ingested body is not a well-formed serialized node.
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// A node body exceeds the configured size limit.
    #[error("node {id} too large ({size} > {max} bytes)")]
    OversizedNode { id: ObjectId, size: usize, max: usize },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection pool was shut down.
    #[error("connection pool closed")]
    PoolClosed,

    /// Any other backend failure. Retrying the batch is safe.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
