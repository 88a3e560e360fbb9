//! Configuration loading and resolution
//!
//! Config file resolution priority:
//! 1. Command-line `--config` path (highest priority)
//! 2. `MOODLENS_CONFIG` environment variable
//! 3. Per-user config file (`~/.config/moodlens/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing file is never fatal: the service logs a warning and starts with
//! compiled defaults. A file that exists but does not parse is an error.
//!
//! Individual thresholds can additionally be overridden through environment
//! variables so they can be tuned without editing files or code.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Mood, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MOODLENS_CONFIG";
/// Environment override for [`Thresholds::audio_low_confidence`]
pub const AUDIO_LOW_CONF_ENV_VAR: &str = "MOODLENS_AUDIO_LOW_CONF";
/// Environment override for [`Thresholds::lyrics_low_confidence`]
pub const LYRICS_LOW_CONF_ENV_VAR: &str = "MOODLENS_LYRICS_LOW_CONF";
/// Environment override for [`Thresholds::borderline_margin`]
pub const BORDERLINE_MARGIN_ENV_VAR: &str = "MOODLENS_BORDERLINE_MARGIN";

/// Complete TOML configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub thresholds: Thresholds,
    pub training: TrainingConfig,
    pub lyrics: LyricsRules,
}

/// HTTP bind address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Data and model locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the processed CSV files
    pub data_dir: PathBuf,
    /// Serialized model artifact
    pub model_path: PathBuf,
    /// Corpus of reconciled predictions (relative to `data_dir` unless absolute)
    pub predictions_csv: PathBuf,
    /// Labeled dataset (relative to `data_dir` unless absolute)
    pub dataset_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/processed"),
            model_path: PathBuf::from("models/mood_model.json"),
            predictions_csv: PathBuf::from("songs_with_predictions.csv"),
            dataset_csv: PathBuf::from("songs_mapped.csv"),
        }
    }
}

impl PathsConfig {
    /// Resolve a data file against `data_dir` unless it is already absolute
    pub fn data_file(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.data_file(&self.predictions_csv)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_file(&self.dataset_csv)
    }
}

/// Low-confidence and borderline cut-offs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Audio prediction is low-confidence when confidence < this
    pub audio_low_confidence: f64,
    /// Lyrics prediction is low-confidence when confidence < this
    pub lyrics_low_confidence: f64,
    /// Audio prediction is borderline when margin < this
    pub borderline_margin: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            audio_low_confidence: 0.35,
            lyrics_low_confidence: 0.6,
            borderline_margin: 0.15,
        }
    }
}

impl Thresholds {
    /// All thresholds must lie in [0, 1]
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("audio_low_confidence", self.audio_low_confidence),
            ("lyrics_low_confidence", self.lyrics_low_confidence),
            ("borderline_margin", self.borderline_margin),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "threshold {} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// How the labeled dataset is partitioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// 70% train / 20% validation / 10% test
    TrainValidationTest,
    /// 80% train / 20% test
    TrainTest,
}

impl SplitPolicy {
    /// (validation fraction, test fraction) of the whole dataset
    pub fn fractions(&self) -> (f64, f64) {
        match self {
            SplitPolicy::TrainValidationTest => (0.20, 0.10),
            SplitPolicy::TrainTest => (0.0, 0.20),
        }
    }
}

/// Offline training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Per-class row cap applied before splitting; 0 disables downsampling
    pub max_per_class: usize,
    /// Seed for downsampling, splitting, fold assignment and forests
    pub seed: u64,
    /// Stratified cross-validation folds
    pub cv_folds: usize,
    pub split: SplitPolicy,
    pub forest_trees: usize,
    pub knn_neighbors: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_per_class: 5000,
            seed: 42,
            cv_folds: 5,
            split: SplitPolicy::TrainValidationTest,
            forest_trees: 400,
            knn_neighbors: 5,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(Error::Config(format!(
                "training.cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.forest_trees == 0 || self.knn_neighbors == 0 {
            return Err(Error::Config(
                "training.forest_trees and training.knn_neighbors must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lyrics sentiment-to-mood rule set
///
/// The constants were tuned by hand rather than fitted to labeled data, so
/// they live in configuration with a version string that is echoed in logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsRules {
    pub version: String,
    /// compound > this → happy (confidence = compound)
    pub happy_above: f64,
    /// compound > this (and ≤ `happy_above`) → chill
    pub chill_above: f64,
    /// compound < this → sad (confidence = |compound|)
    pub sad_below: f64,
    /// compound < this (and ≥ `sad_below`) → mildly negative band
    pub mild_negative_below: f64,
    /// In the mildly negative band, |compound| above this → sad, else chill
    pub mild_sad_magnitude: f64,
    /// Confidence for the near-neutral band
    pub neutral_confidence: f64,
    /// Result for empty or missing lyrics
    pub empty_mood: Mood,
    pub empty_confidence: f64,
    /// Keyword override applies only when compound > this
    pub hype_min_compound: f64,
    pub hype_bonus: f64,
    pub hype_cap: f64,
    /// Energetic keywords (matched as lowercase substrings)
    pub keywords: Vec<String>,
}

impl Default for LyricsRules {
    fn default() -> Self {
        Self {
            version: "lyrics-rules-1".to_string(),
            happy_above: 0.5,
            chill_above: 0.1,
            sad_below: -0.5,
            mild_negative_below: -0.1,
            mild_sad_magnitude: 0.3,
            neutral_confidence: 0.65,
            empty_mood: Mood::Chill,
            empty_confidence: 0.1,
            hype_min_compound: 0.2,
            hype_bonus: 0.2,
            hype_cap: 0.9,
            keywords: [
                "party", "dance", "energy", "fire", "wild", "crazy", "lit", "pump", "beat",
                "bass", "drop", "turnt", "hype",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

impl LyricsRules {
    pub fn validate(&self) -> Result<()> {
        if !(self.sad_below <= self.mild_negative_below
            && self.mild_negative_below <= self.chill_above
            && self.chill_above <= self.happy_above)
        {
            return Err(Error::Config(format!(
                "lyrics rule bands out of order ({}): sad_below <= mild_negative_below <= chill_above <= happy_above",
                self.version
            )));
        }
        Ok(())
    }
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.training.validate()?;
        self.lyrics.validate()?;
        Ok(())
    }

    /// Apply `MOODLENS_*` threshold overrides from the environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let overrides = [
            (AUDIO_LOW_CONF_ENV_VAR, &mut self.thresholds.audio_low_confidence),
            (LYRICS_LOW_CONF_ENV_VAR, &mut self.thresholds.lyrics_low_confidence),
            (BORDERLINE_MARGIN_ENV_VAR, &mut self.thresholds.borderline_margin),
        ];
        for (var, slot) in overrides {
            if let Ok(raw) = std::env::var(var) {
                let value: f64 = raw.trim().parse().map_err(|e| {
                    Error::Config(format!("{}='{}' is not a number: {}", var, raw, e))
                })?;
                info!("{} override: {}", var, value);
                *slot = value;
            }
        }
        self.thresholds.validate()
    }
}

/// Resolves which config file to read and loads it
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<&Path>) -> Self {
        Self {
            cli_path: cli_path.map(Path::to_path_buf),
        }
    }

    /// Config file candidate by priority (may not exist)
    pub fn config_path(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file
        default_config_path()
    }

    /// Load configuration, falling back to compiled defaults when no file exists.
    ///
    /// Environment threshold overrides are applied last.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match self.config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                TomlConfig::load(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                warn!("Could not determine config directory, using compiled defaults");
                TomlConfig::default()
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }
}

/// Platform config file location (`<config_dir>/moodlens/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("moodlens").join("config.toml"))
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.thresholds.audio_low_confidence, 0.35);
        assert_eq!(config.thresholds.lyrics_low_confidence, 0.6);
        assert_eq!(config.thresholds.borderline_margin, 0.15);
        assert_eq!(config.training.max_per_class, 5000);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.cv_folds, 5);
        assert_eq!(config.lyrics.keywords.len(), 13);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [thresholds]
            audio_low_confidence = 0.4

            [training]
            split = "train_test"
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.audio_low_confidence, 0.4);
        assert_eq!(config.thresholds.borderline_margin, 0.15);
        assert_eq!(config.training.split, SplitPolicy::TrainTest);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let err = TomlConfig::from_toml_str("[thresholds]\nborderline_margin = 1.5\n");
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_misordered_lyrics_bands_rejected() {
        let err = TomlConfig::from_toml_str("[lyrics]\nhappy_above = 0.05\n");
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_split_fractions() {
        assert_eq!(SplitPolicy::TrainValidationTest.fractions(), (0.20, 0.10));
        assert_eq!(SplitPolicy::TrainTest.fractions(), (0.0, 0.20));
    }

    #[test]
    fn test_data_file_resolution() {
        let paths = PathsConfig::default();
        assert_eq!(
            paths.predictions_path(),
            PathBuf::from("data/processed/songs_with_predictions.csv")
        );
        assert_eq!(
            paths.data_file(Path::new("/abs/x.csv")),
            PathBuf::from("/abs/x.csv")
        );
    }
}
