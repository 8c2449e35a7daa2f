use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use vits_core::ModelError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error payload. Clients look for the `error` key, not the status code.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::InvalidInput(msg) => tracing::warn!("Rejected request: {msg}"),
            ApiError::Model(e) => tracing::error!("TTS error: {e}"),
            ApiError::InternalError(msg) => tracing::error!("Internal error: {msg}"),
        }

        Json(ErrorResponse {
            error: self.to_string(),
        })
        .into_response()
    }
}
