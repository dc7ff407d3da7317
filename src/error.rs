// src/error.rs
//! Errors surfaced to callers. Aggregations never produce these for upstream
//! flakiness; only single-source operations and the auth gate do.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::aggregate::types::SourceFailure;
use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum AggregatorError {
    /// No registered source has this key.
    #[error("source `{key}` not found")]
    NotFound { key: String },

    /// The one addressed source failed.
    #[error("source `{key}` failed: {failure}")]
    Source { key: String, failure: SourceFailure },

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    /// Authenticated, but not allowed to use this route.
    #[error("caller `{caller}` is not an admin")]
    Forbidden { caller: String },

    #[error("registry reload failed: {0}")]
    Reload(String),
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AggregatorError::NotFound { key } => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Site not found", "key": key }),
            ),
            AggregatorError::Source { key, failure } => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "Source Error", "key": key, "kind": failure.kind() }),
            ),
            AggregatorError::Unauthorized(e) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": e.to_string() }))
            }
            AggregatorError::Forbidden { .. } => {
                (StatusCode::FORBIDDEN, json!({ "error": "Forbidden" }))
            }
            AggregatorError::Reload(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Reload failed", "reason": reason }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
