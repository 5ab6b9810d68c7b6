//! Crate-wide error type for the things that are genuinely exceptional:
//! an unreachable database, an unreadable config file, a malformed
//! internal invariant. Per §7 of the spec, policy violations and protocol
//! desync never produce a `ServerError` — those are modeled as outbound
//! messages queued by a handler that still returns normally. This type is
//! reserved for the narrow HTTP surface (`http.rs`) and the persistence
//! boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Database(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Serialization(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
        };
        let body = axum::Json(ErrorBody { error: self.to_string() });
        (status, body).into_response()
    }
}
