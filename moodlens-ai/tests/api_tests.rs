//! Integration tests for moodlens-ai API endpoints
//!
//! Tests cover:
//! - Health endpoint (model/corpus status, last error)
//! - Single-song prediction: explicit features, dataset lookup, schema errors
//! - Statistics and dataset distribution, including missing and degenerate corpora

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::*;
use moodlens_ai::classifier::EstimatorKind;
use moodlens_ai::service::MoodService;
use moodlens_ai::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: data dir with a dataset and a trained model
fn setup_state(dir: &TempDir) -> AppState {
    let csv = synthetic_csv(15, 11);
    write_file(dir.path(), "songs_mapped.csv", &csv);
    let config = config_in(dir.path());
    train(&csv, &[EstimatorKind::LogisticRegression])
        .save(&config.paths.model_path)
        .unwrap();
    AppState::new(MoodService::from_config(config))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: send one request, return status and JSON body
async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    (status, serde_json::from_slice(&bytes).expect("Should parse JSON"))
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) = send(&state, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "moodlens-ai");
    assert_eq!(body["audio_model_loaded"], true);
    assert_eq!(body["lyrics_model_loaded"], true);
    assert_eq!(body["predictions_file_exists"], false);
    assert!(body["uptime_seconds"].is_u64());
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_without_model_health_degrades_and_predict_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(MoodService::from_config(config_in(dir.path())));

    let (status, body) = send(&state, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["audio_model_loaded"], false);

    let (status, body) = send(&state, post_json("/api/predict", json!({"song": "x"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "UNAVAILABLE");

    let (_, body) = send(&state, get("/api/health")).await;
    assert!(body["last_error"].as_str().unwrap().contains("not loaded"));
}

// =============================================================================
// Prediction
// =============================================================================

#[tokio::test]
async fn test_predict_with_features_and_no_lyrics() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);
    let request = json!({
        "song": "Unlisted Tune",
        "audio_features": {"tempo": 71.0, "energy": 0.15, "Valence": 0.1, "danceability": 0.25}
    });

    let (status, body) = send(&state, post_json("/api/predict", request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["song"], "Unlisted Tune");
    assert_eq!(body["artist"], "Unknown Artist");
    assert_eq!(body["audio"]["mood"], "sad");
    assert_eq!(body["audio"]["source"], "request");
    let confidence = body["audio"]["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert!(body["audio"]["lowConfidence"].is_boolean());
    assert!(body["lyrics"].is_null());
    assert!(body["agree"].is_null());
    assert!(body["topTwoCombo"].as_str().unwrap().starts_with("sad"));
}

#[tokio::test]
async fn test_predict_with_lyrics_sets_agreement() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);
    let request = json!({
        "song": "Unlisted Tune",
        "artist": "Someone",
        "audio_features": {"tempo": 150.0, "energy": 0.95, "valence": 0.5, "danceability": 0.9},
        "lyrics": "Party all night, dance with me, so much fun"
    });

    let (status, body) = send(&state, post_json("/api/predict", request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["audio"]["mood"], "hyped");
    assert_eq!(body["lyrics"]["mood"], "hyped");
    assert_eq!(body["agree"], true);
}

#[tokio::test]
async fn test_predict_looks_up_song_in_dataset() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) =
        send(&state, post_json("/api/predict", json!({"song": "song 2-3"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["audio"]["source"], "dataset");
    assert_eq!(body["audio"]["mood"], "sad");
    assert_eq!(body["lyrics"]["mood"], "sad");
    assert_eq!(body["agree"], true);
}

#[tokio::test]
async fn test_predict_unknown_song_without_features_is_schema_error() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) =
        send(&state, post_json("/api/predict", json!({"song": "Not In Dataset"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SCHEMA_ERROR");
    assert_eq!(body["error"]["missing"], json!(["audio_features"]));
    assert!(body["error"]["available"].is_array());
}

#[tokio::test]
async fn test_predict_with_unrecognised_features_lists_required() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);
    let request = json!({"song": "x", "audio_features": {"colour": 1.0}});

    let (status, body) = send(&state, post_json("/api/predict", request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["missing"],
        json!(["tempo", "energy", "valence", "danceability"])
    );
    assert_eq!(body["error"]["available"], json!(["colour"]));
}

#[tokio::test]
async fn test_predict_rejects_blank_song() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) = send(&state, post_json("/api/predict", json!({"song": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_predict_missing_song_is_structured_error() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) = send(&state, post_json("/api/predict", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("song"));
}

#[tokio::test]
async fn test_predict_malformed_body_is_structured_error() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) = send(&state, post_json("/api/predict", json!({"song": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (_, health) = send(&state, get("/api/health")).await;
    assert!(health["last_error"].is_string());
}

#[tokio::test]
async fn test_predict_null_feature_is_imputed() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);
    let request = json!({
        "song": "x",
        "audio_features": {"tempo": null, "energy": 0.15, "valence": 0.1, "danceability": 0.25}
    });

    let (status, body) = send(&state, post_json("/api/predict", request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["audio"]["missingFeatures"], json!(["tempo"]));
    assert_eq!(body["audio"]["mood"], "sad");
}

// =============================================================================
// Statistics
// =============================================================================

#[tokio::test]
async fn test_stats_without_corpus_is_not_found() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) = send(&state, get("/api/stats")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (_, health) = send(&state, get("/api/health")).await;
    assert!(health["last_error"].is_string());
}

#[tokio::test]
async fn test_stats_from_written_corpus() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);
    let frame = frame_from_csv(&synthetic_csv(3, 12));
    let output = state.service.config().paths.predictions_path();
    state.service.write_predictions(&frame, &output).unwrap();

    let (status, body) = send(&state, get("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agreement"]["total"], 12);
    assert_eq!(body["confusion"].as_array().unwrap().len(), 4);
    assert_eq!(body["distribution"][0]["mood"], "Happy");
    assert_eq!(body["lowConfidence"].as_array().unwrap().len(), 4);
    let bins = body["confidenceDistribution"].as_array().unwrap();
    assert_eq!(bins.len(), 5);
    assert_eq!(bins[4]["range"], "0.8-1.0");

    let (status, body) = send(&state, get("/api/compare")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accuracy"]["rows"], 12);

    let (_, health) = send(&state, get("/api/health")).await;
    assert_eq!(health["predictions_file_exists"], true);
}

#[tokio::test]
async fn test_stats_on_degenerate_corpus() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);
    write_file(
        dir.path(),
        "songs_with_predictions.csv",
        "track_name,audio_prediction,lyrics_prediction\na,happy,\nb,nan,sad\n",
    );

    let (status, body) = send(&state, get("/api/stats")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DEGENERATE_CORPUS");
    assert_eq!(body["error"]["total_rows"], 2);
}

#[tokio::test]
async fn test_dataset_distribution() {
    let dir = TempDir::new().unwrap();
    let state = setup_state(&dir);

    let (status, body) = send(&state, get("/api/dataset")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 60);
    let moods: Vec<&str> = body["distribution"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["mood"].as_str().unwrap())
        .collect();
    assert_eq!(moods, vec!["happy", "chill", "sad", "hyped"]);
    assert_eq!(body["distribution"][0]["percentage"], 25.0);
}
