//! Dashboard statistics endpoints
//!
//! Recomputed from the CSV files on every request; nothing is cached.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use super::{blocking, record_error};
use crate::error::ApiResult;
use crate::stats::{ComparisonReport, DatasetDistribution, StatsPayload};
use crate::AppState;

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatsPayload>> {
    let service = Arc::clone(&state.service);
    match blocking(move || service.stats()).await {
        Ok(stats) => Ok(Json(stats)),
        Err(err) => Err(record_error(&state, err).await),
    }
}

/// GET /api/compare
pub async fn get_comparison(State(state): State<AppState>) -> ApiResult<Json<ComparisonReport>> {
    let service = Arc::clone(&state.service);
    match blocking(move || service.compare()).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => Err(record_error(&state, err).await),
    }
}

/// GET /api/dataset
pub async fn get_dataset(State(state): State<AppState>) -> ApiResult<Json<DatasetDistribution>> {
    let service = Arc::clone(&state.service);
    match blocking(move || service.dataset_distribution()).await {
        Ok(distribution) => Ok(Json(distribution)),
        Err(err) => Err(record_error(&state, err).await),
    }
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/compare", get(get_comparison))
        .route("/api/dataset", get(get_dataset))
}
