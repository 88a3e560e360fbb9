//! moodlens-ai - Mood prediction API server
//!
//! Serves single-song predictions and corpus statistics to the dashboard.
//! The audio model and lookup dataset are loaded once at startup; a missing
//! model leaves the server up in a degraded state (`/api/health` reports it).

use anyhow::{Context, Result};
use clap::Parser;
use moodlens_ai::logging::{init_tracing, log_build_info};
use moodlens_ai::{build_router, AppState, MoodService};
use moodlens_common::config::ConfigResolver;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "MoodLens prediction API server")]
struct Args {
    /// Config file (default: $MOODLENS_CONFIG, then ~/.config/moodlens/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "MOODLENS_PORT")]
    port: Option<u16>,

    /// Model artifact (overrides [paths] model_path)
    #[arg(short, long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config.as_deref())
        .resolve()
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(model) = args.model {
        config.paths.model_path = model;
    }

    init_tracing(&config.logging).context("Failed to initialize logging")?;
    log_build_info("moodlens-ai");

    let bind = format!("{}:{}", config.server.host, config.server.port);
    info!("Data directory: {}", config.paths.data_dir.display());
    info!(
        audio_low_confidence = config.thresholds.audio_low_confidence,
        lyrics_low_confidence = config.thresholds.lyrics_low_confidence,
        borderline_margin = config.thresholds.borderline_margin,
        "Thresholds"
    );

    let service = tokio::task::spawn_blocking(move || MoodService::from_config(config))
        .await
        .context("Service initialization panicked")?;
    let app = build_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/api/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
