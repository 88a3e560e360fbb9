//! Single-song prediction endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use super::{blocking, record_error};
use crate::error::{ApiError, ApiResult};
use crate::service::{PredictRequest, PredictResponse};
use crate::AppState;

/// POST /api/predict
///
/// Body: `{song, artist?, audio_features?, lyrics?, skip_imputation?}`.
/// Malformed bodies are 400 with the usual error object; returns 503 while
/// no audio model is loaded.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = ApiError::BadRequest(rejection.body_text());
            return Err(record_error(&state, err).await);
        }
    };
    if request.song.trim().is_empty() {
        let err = ApiError::BadRequest("Missing required field: 'song'".to_string());
        return Err(record_error(&state, err).await);
    }
    if !state.service.audio_model_loaded() {
        let err = ApiError::Unavailable("Audio model not loaded".to_string());
        return Err(record_error(&state, err).await);
    }

    let service = Arc::clone(&state.service);
    match blocking(move || service.predict(&request)).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err(record_error(&state, err).await),
    }
}

pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/api/predict", post(predict))
}
