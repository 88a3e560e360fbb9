//! Prediction service
//!
//! `MoodService` owns everything the request path needs: the loaded audio
//! artifact, the lyrics heuristic, the reconciler and the thresholds. It is
//! built once at startup and shared read-only (`Arc<MoodService>`) by every
//! handler and batch driver.

use moodlens_common::config::TomlConfig;
use moodlens_common::{Error, Mood, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::classifier::{Inference, ModelArtifact};
use crate::corpus::{self, CorpusRow};
use crate::dataset::read_raw_frame;
use crate::lyrics::LyricsClassifier;
use crate::normalizer::{normalize_frame, CanonicalRow, Feature, FeatureRecord, NormalizedFrame};
use crate::reconcile::{Reconciler, ReconciledVerdict, SongIdentity};
use crate::stats::{self, ComparisonReport, DatasetDistribution, StatsEngine, StatsPayload};

/// Fewest recognised features a dataset row needs to stand in for a request
pub const MIN_LOOKUP_FEATURES: usize = 3;

/// Artist value the dashboard sends when none is known
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Batch progress is logged every this many rows
const PROGRESS_INTERVAL: usize = 100;

// ============================================================================
// Request / response
// ============================================================================

/// `POST /api/predict` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    /// Required; a missing or blank value is rejected by [`MoodService::predict`]
    #[serde(default)]
    pub song: String,
    #[serde(default)]
    pub artist: Option<String>,
    /// Feature name (any alias) → value, `null` meaning missing; looked up
    /// in the dataset when absent
    #[serde(default)]
    pub audio_features: Option<BTreeMap<String, Option<f64>>>,
    /// Looked up in the dataset when absent
    #[serde(default)]
    pub lyrics: Option<String>,
    /// Fill missing features with 0.0 instead of the training medians
    #[serde(default)]
    pub skip_imputation: bool,
}

/// Where the audio features of a prediction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSource {
    Request,
    Dataset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPayload {
    pub mood: Mood,
    /// `null` when the estimator gives only a hard label
    pub confidence: Option<f64>,
    pub low_confidence: Option<bool>,
    pub second_choice: Option<Mood>,
    pub margin: Option<f64>,
    pub borderline: bool,
    pub source: FeatureSource,
    /// Features that were imputed
    pub missing_features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsPayload {
    pub mood: Mood,
    pub confidence: f64,
    pub low_confidence: bool,
}

/// `POST /api/predict` response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub song: String,
    pub artist: String,
    pub audio: AudioPayload,
    pub lyrics: Option<LyricsPayload>,
    /// `null` when no lyrics prediction exists
    pub agree: Option<bool>,
    pub top_two_combo: String,
}

impl PredictResponse {
    fn from_verdict(
        verdict: &ReconciledVerdict,
        source: FeatureSource,
        missing_features: Vec<Feature>,
    ) -> Self {
        let scored = verdict.audio.prediction();
        Self {
            song: verdict.identity.song.clone(),
            artist: verdict.identity.artist.clone(),
            audio: AudioPayload {
                mood: verdict.audio.mood(),
                confidence: scored.map(|p| p.confidence),
                low_confidence: verdict.audio_low_confidence,
                second_choice: scored.and_then(|p| p.second_choice),
                margin: scored.map(|p| p.margin),
                borderline: verdict.audio_borderline,
                source,
                missing_features,
            },
            lyrics: verdict.lyrics.map(|p| LyricsPayload {
                mood: p.mood,
                confidence: p.confidence,
                low_confidence: verdict.lyrics_low_confidence.unwrap_or(false),
            }),
            agree: verdict.agree,
            top_two_combo: verdict.top_two_combo.clone(),
        }
    }
}

// ============================================================================
// Batch outcomes
// ============================================================================

/// Result of one batch row; failures never halt the batch
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Verdict {
        verdict: ReconciledVerdict,
        /// Ground-truth label of the source row, if any
        true_mood: Option<Mood>,
    },
    Failed {
        row: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub outcomes: Vec<RowOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchOutcome {
    fn from_outcomes(outcomes: Vec<RowOutcome>) -> Self {
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, RowOutcome::Failed { .. }))
            .count();
        Self {
            succeeded: outcomes.len() - failed,
            failed,
            outcomes,
        }
    }

    /// Flattened corpus rows for the successful outcomes, in input order
    pub fn corpus_rows(&self) -> Vec<CorpusRow> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RowOutcome::Verdict { verdict, true_mood } => {
                    Some(CorpusRow::from_verdict(verdict, *true_mood))
                }
                RowOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

// ============================================================================
// Service
// ============================================================================

/// Long-lived prediction context
#[derive(Debug)]
pub struct MoodService {
    config: TomlConfig,
    model: Option<ModelArtifact>,
    lyrics: LyricsClassifier,
    reconciler: Reconciler,
    stats: StatsEngine,
    /// Normalized dataset used to fill in features and lyrics by song name
    lookup: Option<NormalizedFrame>,
}

impl MoodService {
    pub fn new(
        config: TomlConfig,
        model: Option<ModelArtifact>,
        lookup: Option<NormalizedFrame>,
    ) -> Self {
        let lyrics = LyricsClassifier::new(config.lyrics.clone());
        Self {
            reconciler: Reconciler::new(config.thresholds),
            stats: StatsEngine::new(config.thresholds),
            config,
            model,
            lyrics,
            lookup,
        }
    }

    /// Load the artifact and lookup dataset named by the config.
    ///
    /// Either may be missing: the service still starts, and requests that
    /// need the missing piece fail with a precise error.
    pub fn from_config(config: TomlConfig) -> Self {
        let model = match ModelArtifact::load(&config.paths.model_path) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(
                    path = %config.paths.model_path.display(),
                    error = %e,
                    "Audio model unavailable"
                );
                None
            }
        };

        let dataset_path = config.paths.dataset_path();
        let lookup = match read_raw_frame(&dataset_path) {
            Ok(frame) => {
                let normalized = normalize_frame(&frame);
                info!(
                    path = %dataset_path.display(),
                    rows = normalized.rows.len(),
                    "Loaded lookup dataset"
                );
                Some(normalized)
            }
            Err(e) => {
                warn!(path = %dataset_path.display(), error = %e, "Lookup dataset unavailable");
                None
            }
        };

        Self::new(config, model, lookup)
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&ModelArtifact> {
        self.model.as_ref()
    }

    pub fn audio_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn lyrics_classifier(&self) -> &LyricsClassifier {
        &self.lyrics
    }

    pub fn predictions_file_exists(&self) -> bool {
        self.config.paths.predictions_path().exists()
    }

    fn require_model(&self) -> Result<&ModelArtifact> {
        self.model.as_ref().ok_or_else(|| {
            Error::Model(format!(
                "Audio model not loaded from {}",
                self.config.paths.model_path.display()
            ))
        })
    }

    /// Predict and reconcile one song
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let song = request.song.trim();
        if song.is_empty() {
            return Err(Error::InvalidInput("Missing required field: 'song'".to_string()));
        }
        let artist = request
            .artist
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNKNOWN_ARTIST);
        let model = self.require_model()?;

        let (record, source) = match &request.audio_features {
            Some(values) => {
                let record = FeatureRecord::from_named(
                    values
                        .iter()
                        .filter_map(|(k, v)| v.map(|v| (k.as_str(), v))),
                );
                if record.missing_count() == Feature::COUNT {
                    return Err(Error::schema(
                        model.features.iter().map(|f| f.as_str()),
                        values.keys().cloned(),
                    ));
                }
                (record, FeatureSource::Request)
            }
            None => {
                let row = self.find_song(song, artist, has_enough_features).ok_or_else(|| {
                    Error::schema(
                        ["audio_features"],
                        self.lookup
                            .iter()
                            .flat_map(|f| f.present_features.iter().map(|f| f.as_str())),
                    )
                })?;
                (row.features, FeatureSource::Dataset)
            }
        };

        let lyrics_text = request.lyrics.clone().or_else(|| {
            self.find_song(song, artist, |row| has_lyrics(row))
                .and_then(|row| row.lyrics.clone())
        });

        let audio = if request.skip_imputation {
            model.infer_with_fallback(&record, 0.0)
        } else {
            model.infer(&record)
        };
        let lyrics = lyrics_text.as_deref().map(|text| {
            self.lyrics
                .classify(Some(text), Some(song), Some(artist))
                .prediction()
        });

        let identity = SongIdentity {
            song: song.to_string(),
            artist: artist.to_string(),
        };
        let verdict = self.reconciler.reconcile(identity, audio, lyrics);
        debug!(
            song,
            artist,
            audio = %verdict.audio.mood(),
            agree = ?verdict.agree,
            "Prediction served"
        );

        let missing = model
            .features
            .iter()
            .copied()
            .filter(|f| record.get(*f).is_none())
            .collect();
        Ok(PredictResponse::from_verdict(&verdict, source, missing))
    }

    /// First lookup row whose song (and artist, when known) contains the query
    fn find_song<F>(&self, song: &str, artist: &str, accept: F) -> Option<&CanonicalRow>
    where
        F: Fn(&CanonicalRow) -> bool,
    {
        let song = song.to_lowercase();
        let artist = (artist != UNKNOWN_ARTIST).then(|| artist.to_lowercase());
        self.lookup.as_ref()?.rows.iter().find(|row| {
            let song_matches = row
                .track_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&song));
            let artist_matches = match &artist {
                Some(artist) => row
                    .artists
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(artist.as_str())),
                None => true,
            };
            song_matches && artist_matches && accept(row)
        })
    }

    /// Predict every row of a normalized frame.
    ///
    /// Rows are independent and scored in parallel; outcomes keep input order.
    /// Lyrics are scored only when the frame has a lyrics column.
    pub fn predict_frame(&self, frame: &NormalizedFrame) -> Result<BatchOutcome> {
        let model = self.require_model()?;
        if frame.present_features.is_empty() {
            return Err(Error::schema(
                model.features.iter().map(|f| f.as_str()),
                frame.source_columns.iter().cloned(),
            ));
        }
        let score_lyrics = frame.lyrics_column.is_some();
        let total = frame.rows.len();
        let processed = AtomicUsize::new(0);

        let outcomes: Vec<RowOutcome> = frame
            .rows
            .par_iter()
            .enumerate()
            .map(|(index, row)| {
                let outcome = self.predict_row(model, index, row, score_lyrics);
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_INTERVAL == 0 {
                    info!(processed = done, total, "Batch progress");
                }
                outcome
            })
            .collect();

        let batch = BatchOutcome::from_outcomes(outcomes);
        info!(
            total,
            succeeded = batch.succeeded,
            failed = batch.failed,
            "Batch prediction complete"
        );
        Ok(batch)
    }

    fn predict_row(
        &self,
        model: &ModelArtifact,
        index: usize,
        row: &CanonicalRow,
        score_lyrics: bool,
    ) -> RowOutcome {
        if row.features.missing_count() == Feature::COUNT {
            return RowOutcome::Failed {
                row: index,
                reason: "no audio features".to_string(),
            };
        }
        let song = row.track_name.clone().unwrap_or_default();
        let artist = row.artists.clone().unwrap_or_default();

        let audio: Inference = model.infer(&row.features);
        let lyrics = score_lyrics.then(|| {
            self.lyrics
                .classify(row.lyrics.as_deref(), Some(&song), Some(&artist))
                .prediction()
        });
        let verdict = self
            .reconciler
            .reconcile(SongIdentity { song, artist }, audio, lyrics);
        RowOutcome::Verdict {
            verdict,
            true_mood: row.mood,
        }
    }

    /// Predict a frame and write the corpus CSV to `output`
    pub fn write_predictions(&self, frame: &NormalizedFrame, output: &Path) -> Result<BatchOutcome> {
        let batch = self.predict_frame(frame)?;
        corpus::write_corpus_csv(&batch.corpus_rows(), output)?;
        Ok(batch)
    }

    /// Corpus rows from the configured predictions file
    pub fn load_corpus(&self) -> Result<Vec<CorpusRow>> {
        corpus::read_corpus_csv(&self.config.paths.predictions_path())
    }

    /// Dashboard statistics over the configured predictions file
    pub fn stats(&self) -> Result<StatsPayload> {
        self.stats.compute(&self.load_corpus()?)
    }

    pub fn compare(&self) -> Result<ComparisonReport> {
        self.stats.compare(&self.load_corpus()?)
    }

    /// Label distribution of the configured dataset file
    pub fn dataset_distribution(&self) -> Result<DatasetDistribution> {
        let frame = read_raw_frame(&self.config.paths.dataset_path())?;
        stats::dataset_distribution(&normalize_frame(&frame))
    }
}

fn has_enough_features(row: &CanonicalRow) -> bool {
    Feature::COUNT - row.features.missing_count() >= MIN_LOOKUP_FEATURES
}

fn has_lyrics(row: &CanonicalRow) -> bool {
    row.lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::RawFrame;

    fn lookup() -> NormalizedFrame {
        let mut frame = RawFrame::new([
            "track_name",
            "artists",
            "energy",
            "valence",
            "tempo",
            "lyrics",
        ]);
        frame.push_row(["Blue Night", "Ana", "0.2", "", "", "so sad and lonely"]);
        frame.push_row(["Blue Night", "Ben", "0.9", "0.8", "130", ""]);
        frame.push_row(["Blue Night (Remix)", "Ana", "0.5", "0.5", "100", "party"]);
        normalize_frame(&frame)
    }

    fn service() -> MoodService {
        MoodService::new(TomlConfig::default(), None, Some(lookup()))
    }

    #[test]
    fn test_find_song_requires_enough_features() {
        let service = service();
        let row = service
            .find_song("blue night", UNKNOWN_ARTIST, has_enough_features)
            .unwrap();
        assert_eq!(row.artists.as_deref(), Some("Ben"));
    }

    #[test]
    fn test_find_song_filters_by_artist() {
        let service = service();
        let row = service.find_song("BLUE", "ana", has_enough_features).unwrap();
        assert_eq!(row.track_name.as_deref(), Some("Blue Night (Remix)"));
        let lyrics = service.find_song("blue", "ana", has_lyrics).unwrap();
        assert_eq!(lyrics.lyrics.as_deref(), Some("so sad and lonely"));
        assert!(service.find_song("yellow", UNKNOWN_ARTIST, |_| true).is_none());
    }

    #[test]
    fn test_predict_without_model() {
        let err = service()
            .predict(&PredictRequest {
                song: "Blue Night".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn test_predict_rejects_empty_song() {
        let err = service()
            .predict(&PredictRequest {
                song: "  ".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_batch_outcome_counts() {
        let batch = BatchOutcome::from_outcomes(vec![
            RowOutcome::Failed {
                row: 0,
                reason: "no audio features".into(),
            },
            RowOutcome::Failed {
                row: 1,
                reason: "no audio features".into(),
            },
        ]);
        assert_eq!((batch.succeeded, batch.failed), (0, 2));
        assert!(batch.corpus_rows().is_empty());
    }
}
