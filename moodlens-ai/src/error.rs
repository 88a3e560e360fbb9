//! Error types for moodlens-ai
//!
//! Every failure reaching an HTTP client is a JSON object:
//! `{"error": {"code": ..., "message": ..., <details>}}`. Schema errors list
//! what was missing and what was available so the caller can fix the request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404), e.g. predictions CSV or model artifact absent
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Required features or columns absent (400)
    #[error("Missing required fields: {missing:?}")]
    Schema {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// Corpus had no valid rows after filtering (400)
    #[error("No valid rows after filtering ({total_rows} rows inspected)")]
    DegenerateCorpus { total_rows: usize },

    /// Service not ready, e.g. model not loaded (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<moodlens_common::Error> for ApiError {
    fn from(err: moodlens_common::Error) -> Self {
        use moodlens_common::Error;
        match err {
            Error::Schema { missing, available } => ApiError::Schema { missing, available },
            Error::DegenerateCorpus { total_rows } => ApiError::DegenerateCorpus { total_rows },
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                ApiError::NotFound(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let mut details = Map::new();

        let (status, error_code) = match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Schema { missing, available } => {
                details.insert("missing".to_string(), json!(missing));
                details.insert("available".to_string(), json!(available));
                (StatusCode::BAD_REQUEST, "SCHEMA_ERROR")
            }
            ApiError::DegenerateCorpus { total_rows } => {
                details.insert("total_rows".to_string(), json!(total_rows));
                (StatusCode::BAD_REQUEST, "DEGENERATE_CORPUS")
            }
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let mut error = Map::new();
        error.insert("code".to_string(), Value::from(error_code));
        error.insert("message".to_string(), Value::from(message));
        error.extend(details);

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
