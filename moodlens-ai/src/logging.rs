//! Tracing setup shared by the binaries

use moodlens_common::config::LoggingConfig;
use moodlens_common::{Error, Result};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `logging.level` from the config file.
/// With `logging.file` set, output is appended to that file instead of stderr.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            Error::Config(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.try_init(),
    };
    installed.map_err(|e| Error::Config(format!("Tracing init failed: {}", e)))
}

/// Build identification line; log it right after tracing init
pub fn log_build_info(binary: &str) {
    info!(
        "Starting {} v{} [{}] built {} ({})",
        binary,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
}
