//! moodlens-ai library interface
//!
//! The prediction-and-agreement pipeline plus its HTTP surface:
//! - [`normalizer`] / [`dataset`]: canonical feature schema and CSV input
//! - [`classifier`]: the audio model (training, artifact, inference)
//! - [`lyrics`]: the VADER sentiment heuristic
//! - [`reconcile`]: per-song agreement verdicts
//! - [`stats`]: corpus-level dashboard statistics
//! - [`service`] / [`api`]: the shared prediction context and axum routes

pub mod api;
pub mod classifier;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod lyrics;
pub mod normalizer;
pub mod reconcile;
pub mod service;
pub mod stats;

pub use crate::error::{ApiError, ApiResult};
pub use crate::service::MoodService;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Prediction context, immutable after startup
    pub service: Arc<MoodService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last request failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(service: MoodService) -> Self {
        Self {
            service: Arc::new(service),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::predict_routes())
        .merge(api::stats_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
