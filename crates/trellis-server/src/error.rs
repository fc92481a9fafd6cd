use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use trellis_retrieve::RetrieveError;
use trellis_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upload too large ({size} > {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("retrieve error: {0}")]
    Retrieve(#[from] RetrieveError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Store(StoreError::InvalidNode(_)) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } | Self::Store(StoreError::OversizedNode { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Store(StoreError::PoolClosed) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
