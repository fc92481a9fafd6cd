use trellis_crypto::HasherError;
use trellis_transport::TransportError;

/// Errors from decomposing an object graph.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The producer handed over a value the decomposer cannot lay out.
    /// Fatal to the current write.
    #[error("contract violation at {path}: {reason}")]
    ContractViolation { path: String, reason: String },

    /// A finalized node could not be delivered. Retrying is safe.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("hashing error: {0}")]
    Hasher(#[from] HasherError),
}

impl SerializeError {
    pub(crate) fn violation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type SerializeResult<T> = Result<T, SerializeError>;
