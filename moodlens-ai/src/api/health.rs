//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the audio model is not loaded
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub audio_model_loaded: bool,
    pub lyrics_model_loaded: bool,
    pub predictions_file_exists: bool,
    /// Last request failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;
    let last_error = state.last_error.read().await.clone();
    let audio_model_loaded = state.service.audio_model_loaded();

    Json(HealthResponse {
        status: if audio_model_loaded { "ok" } else { "degraded" }.to_string(),
        module: "moodlens-ai".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        audio_model_loaded,
        lyrics_model_loaded: true,
        predictions_file_exists: state.service.predictions_file_exists(),
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}
