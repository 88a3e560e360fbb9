//! HTTP API handlers for moodlens-ai
//!
//! All routes live under `/api` and return JSON. Failures use the
//! [`ApiError`](crate::error::ApiError) body.

pub mod health;
pub mod predict;
pub mod stats;

pub use health::health_routes;
pub use predict::predict_routes;
pub use stats::stats_routes;

use crate::error::ApiError;
use crate::AppState;

/// Remember a failure for `/api/health` diagnostics, then hand it back
pub(crate) async fn record_error(state: &AppState, err: ApiError) -> ApiError {
    *state.last_error.write().await = Some(err.to_string());
    err
}

/// Run blocking service work (file reads, inference) off the async runtime
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> moodlens_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {}", e)))?
        .map_err(ApiError::from)
}
