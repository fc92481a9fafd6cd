use trellis_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

pub type RetrieveResult<T> = Result<T, RetrieveError>;
