//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Request-level errors. Validation failures never touch the store.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `from` must be strictly earlier than `to`
    #[error("from must be earlier than to")]
    InvalidRange,

    /// Unknown anomaly type filter
    #[error("unknown anomaly type: {0}")]
    InvalidType(String),

    /// Unknown phase filter
    #[error("unknown phase: {0}")]
    InvalidPhase(String),

    /// Unknown history interval
    #[error("unknown interval: {0}")]
    InvalidInterval(String),

    /// No reading has been ingested yet
    #[error("no readings ingested yet")]
    NoData,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, token) = match &self {
            ApiError::InvalidRange => (StatusCode::BAD_REQUEST, "INVALID_RANGE"),
            ApiError::InvalidType(_) => (StatusCode::BAD_REQUEST, "INVALID_TYPE"),
            ApiError::InvalidPhase(_) => (StatusCode::BAD_REQUEST, "INVALID_PHASE"),
            ApiError::InvalidInterval(_) => (StatusCode::BAD_REQUEST, "INVALID_INTERVAL"),
            ApiError::NoData => (StatusCode::SERVICE_UNAVAILABLE, "NO_DATA"),
        };

        let body = ErrorResponse {
            error: token.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
