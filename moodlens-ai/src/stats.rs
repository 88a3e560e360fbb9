//! Aggregate Statistics Engine
//!
//! Corpus-level numbers for the dashboard, recomputed on demand from the
//! corpus rows. Every percentage passes through the sanitizers in
//! `moodlens_common::numeric`, so the JSON never carries NaN or Infinity.
//!
//! **Row admission:** a row counts only when both its audio and lyrics
//! predictions name one of the four moods. Other rows leave the denominator
//! instead of counting as disagreements. A corpus with no admissible rows is
//! reported as `DegenerateCorpus`, never as all-zero statistics.

use moodlens_common::config::Thresholds;
use moodlens_common::numeric::{percentage, round1, sanitize_percentage, sanitize_signed_percentage};
use moodlens_common::{Error, Mood, Result};
use serde::Serialize;
use tracing::debug;

use crate::corpus::CorpusRow;
use crate::normalizer::NormalizedFrame;

/// Histogram bin labels; the last bin is closed on the right
pub const CONFIDENCE_BINS: [&str; 5] = ["0.0-0.2", "0.2-0.4", "0.4-0.6", "0.6-0.8", "0.8-1.0"];

// ============================================================================
// Payload types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementStats {
    pub agree: usize,
    pub disagree: usize,
    pub total: usize,
    pub agree_pct: f64,
    pub disagree_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodShare {
    pub mood: &'static str,
    pub audio: f64,
    pub lyrics: f64,
}

/// One confusion matrix row: audio mood × lyrics mood counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionRow {
    pub audio: &'static str,
    pub happy: usize,
    pub chill: usize,
    pub sad: usize,
    pub hyped: usize,
}

impl ConfusionRow {
    pub fn total(&self) -> usize {
        self.happy + self.chill + self.sad + self.hyped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBin {
    pub range: &'static str,
    pub audio_count: usize,
    pub lyrics_count: usize,
}

/// `GET /api/stats` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    pub agreement: AgreementStats,
    pub distribution: Vec<MoodShare>,
    pub confusion: Vec<ConfusionRow>,
    pub low_confidence: Vec<MoodShare>,
    pub confidence_distribution: Vec<ConfidenceBin>,
}

/// Per-mood agreement among rows where audio predicted that mood
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodAgreement {
    pub mood: &'static str,
    pub audio_count: usize,
    pub agree_count: usize,
    pub agree_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisagreementPattern {
    pub audio: Mood,
    pub lyrics: Mood,
    pub count: usize,
}

/// Accuracy of each model against ground-truth labels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAccuracy {
    pub rows: usize,
    pub audio_pct: f64,
    pub lyrics_pct: f64,
    /// `audio_pct - lyrics_pct`
    pub gap_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub agreement: AgreementStats,
    pub per_mood: Vec<MoodAgreement>,
    /// Most frequent first
    pub disagreements: Vec<DisagreementPattern>,
    /// `None` when the corpus carries no ground-truth labels
    pub accuracy: Option<ModelAccuracy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodCount {
    pub mood: &'static str,
    pub count: usize,
    pub percentage: f64,
}

/// `GET /api/dataset` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDistribution {
    pub total: usize,
    pub distribution: Vec<MoodCount>,
}

// ============================================================================
// Engine
// ============================================================================

/// A corpus row that passed admission
#[derive(Debug, Clone, Copy)]
struct Admitted {
    audio: Mood,
    lyrics: Mood,
    audio_confidence: Option<f64>,
    lyrics_confidence: Option<f64>,
    truth: Option<Mood>,
}

fn admit(rows: &[CorpusRow]) -> Result<Vec<Admitted>> {
    let admitted: Vec<Admitted> = rows
        .iter()
        .filter_map(|row| {
            Some(Admitted {
                audio: row.audio_mood()?,
                lyrics: row.lyrics_mood()?,
                audio_confidence: clean_confidence(row.audio_confidence),
                lyrics_confidence: clean_confidence(row.lyrics_confidence),
                truth: row.true_mood(),
            })
        })
        .collect();
    debug!(total = rows.len(), admitted = admitted.len(), "Corpus admission");
    if admitted.is_empty() {
        return Err(Error::DegenerateCorpus {
            total_rows: rows.len(),
        });
    }
    Ok(admitted)
}

/// Clip to [0, 1]; NaN counts as missing, infinities land in the end bins
fn clean_confidence(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan()).map(|v| v.clamp(0.0, 1.0))
}

/// Bin index over [0,0.2),[0.2,0.4),[0.4,0.6),[0.6,0.8),[0.8,1.0]
pub fn confidence_bin(confidence: f64) -> usize {
    ((confidence / 0.2).floor() as usize).min(CONFIDENCE_BINS.len() - 1)
}

fn pct(part: usize, total: usize) -> f64 {
    sanitize_percentage(round1(percentage(part, total)))
}

fn agreement_stats(admitted: &[Admitted]) -> AgreementStats {
    let total = admitted.len();
    let agree = admitted.iter().filter(|r| r.audio == r.lyrics).count();
    let disagree = total - agree;
    AgreementStats {
        agree,
        disagree,
        total,
        agree_pct: pct(agree, total),
        disagree_pct: pct(disagree, total),
    }
}

/// Computes dashboard statistics with the configured low-confidence thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsEngine {
    thresholds: Thresholds,
}

impl StatsEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Full dashboard payload
    pub fn compute(&self, rows: &[CorpusRow]) -> Result<StatsPayload> {
        let admitted = admit(rows)?;
        let total = admitted.len();

        let distribution = Mood::ALL
            .iter()
            .map(|&mood| MoodShare {
                mood: mood.display_name(),
                audio: pct(admitted.iter().filter(|r| r.audio == mood).count(), total),
                lyrics: pct(admitted.iter().filter(|r| r.lyrics == mood).count(), total),
            })
            .collect();

        let confusion = Mood::ALL
            .iter()
            .map(|&audio| {
                let count = |lyrics: Mood| {
                    admitted
                        .iter()
                        .filter(|r| r.audio == audio && r.lyrics == lyrics)
                        .count()
                };
                ConfusionRow {
                    audio: audio.display_name(),
                    happy: count(Mood::Happy),
                    chill: count(Mood::Chill),
                    sad: count(Mood::Sad),
                    hyped: count(Mood::Hyped),
                }
            })
            .collect();

        let low_confidence = Mood::ALL
            .iter()
            .map(|&mood| MoodShare {
                mood: mood.display_name(),
                audio: low_confidence_pct(
                    admitted
                        .iter()
                        .filter(|r| r.audio == mood)
                        .filter_map(|r| r.audio_confidence),
                    self.thresholds.audio_low_confidence,
                ),
                lyrics: low_confidence_pct(
                    admitted
                        .iter()
                        .filter(|r| r.lyrics == mood)
                        .filter_map(|r| r.lyrics_confidence),
                    self.thresholds.lyrics_low_confidence,
                ),
            })
            .collect();

        let mut bins: Vec<ConfidenceBin> = CONFIDENCE_BINS
            .iter()
            .map(|&range| ConfidenceBin {
                range,
                audio_count: 0,
                lyrics_count: 0,
            })
            .collect();
        for row in &admitted {
            if let Some(c) = row.audio_confidence {
                bins[confidence_bin(c)].audio_count += 1;
            }
            if let Some(c) = row.lyrics_confidence {
                bins[confidence_bin(c)].lyrics_count += 1;
            }
        }

        Ok(StatsPayload {
            agreement: agreement_stats(&admitted),
            distribution,
            confusion,
            low_confidence,
            confidence_distribution: bins,
        })
    }

    /// Agreement breakdown, disagreement patterns and accuracy against labels
    pub fn compare(&self, rows: &[CorpusRow]) -> Result<ComparisonReport> {
        let admitted = admit(rows)?;

        let per_mood = Mood::ALL
            .iter()
            .map(|&mood| {
                let audio_count = admitted.iter().filter(|r| r.audio == mood).count();
                let agree_count = admitted
                    .iter()
                    .filter(|r| r.audio == mood && r.lyrics == mood)
                    .count();
                MoodAgreement {
                    mood: mood.display_name(),
                    audio_count,
                    agree_count,
                    agree_pct: pct(agree_count, audio_count),
                }
            })
            .collect();

        let mut disagreements = Vec::new();
        for audio in Mood::ALL {
            for lyrics in Mood::ALL {
                if audio == lyrics {
                    continue;
                }
                let count = admitted
                    .iter()
                    .filter(|r| r.audio == audio && r.lyrics == lyrics)
                    .count();
                if count > 0 {
                    disagreements.push(DisagreementPattern {
                        audio,
                        lyrics,
                        count,
                    });
                }
            }
        }
        // Stable sort keeps dashboard mood order among equal counts
        disagreements.sort_by(|a, b| b.count.cmp(&a.count));

        let labeled: Vec<&Admitted> = admitted.iter().filter(|r| r.truth.is_some()).collect();
        let accuracy = (!labeled.is_empty()).then(|| {
            let audio_pct = pct(
                labeled.iter().filter(|r| r.truth == Some(r.audio)).count(),
                labeled.len(),
            );
            let lyrics_pct = pct(
                labeled.iter().filter(|r| r.truth == Some(r.lyrics)).count(),
                labeled.len(),
            );
            ModelAccuracy {
                rows: labeled.len(),
                audio_pct,
                lyrics_pct,
                gap_pct: sanitize_signed_percentage(round1(audio_pct - lyrics_pct)),
            }
        });

        Ok(ComparisonReport {
            agreement: agreement_stats(&admitted),
            per_mood,
            disagreements,
            accuracy,
        })
    }
}

fn low_confidence_pct<I: Iterator<Item = f64>>(confidences: I, threshold: f64) -> f64 {
    let (low, total) = confidences.fold((0usize, 0usize), |(low, total), c| {
        (low + usize::from(c < threshold), total + 1)
    });
    pct(low, total)
}

/// Label distribution of a labeled dataset
pub fn dataset_distribution(frame: &NormalizedFrame) -> Result<DatasetDistribution> {
    if frame.mood_column.is_none() {
        return Err(Error::schema(["mood"], frame.source_columns.iter().cloned()));
    }
    let moods: Vec<Mood> = frame.rows.iter().filter_map(|r| r.mood).collect();
    if moods.is_empty() {
        return Err(Error::DegenerateCorpus {
            total_rows: frame.rows.len(),
        });
    }
    let total = moods.len();
    let distribution = Mood::ALL
        .iter()
        .map(|&mood| {
            let count = moods.iter().filter(|m| **m == mood).count();
            MoodCount {
                mood: mood.as_str(),
                count,
                percentage: pct(count, total),
            }
        })
        .collect();
    Ok(DatasetDistribution {
        total,
        distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(audio: &str, lyrics: &str) -> CorpusRow {
        CorpusRow {
            audio_prediction: Some(audio.to_string()),
            lyrics_prediction: Some(lyrics.to_string()),
            audio_confidence: Some(0.5),
            lyrics_confidence: Some(0.7),
            ..CorpusRow::default()
        }
    }

    fn scenario() -> Vec<CorpusRow> {
        vec![
            row("happy", "happy"),
            row("sad", "chill"),
            row("chill", "chill"),
            row("hyped", "sad"),
        ]
    }

    #[test]
    fn test_agreement_scenario() {
        let stats = StatsEngine::default().compute(&scenario()).unwrap();
        assert_eq!(stats.agreement.agree, 2);
        assert_eq!(stats.agreement.disagree, 2);
        assert_eq!(stats.agreement.total, 4);
        assert_eq!(stats.agreement.agree_pct, 50.0);

        let sad_row = stats.confusion.iter().find(|r| r.audio == "Sad").unwrap();
        assert_eq!(sad_row.chill, 1);
        let cells: usize = stats.confusion.iter().map(ConfusionRow::total).sum();
        assert_eq!(cells, 4);
        assert_eq!(stats.confusion.len(), 4);
    }

    #[test]
    fn test_inadmissible_rows_leave_denominator() {
        let mut rows = scenario();
        rows.push(row("happy", "nan"));
        rows.push(row("", "sad"));
        rows.push(CorpusRow::default());
        let stats = StatsEngine::default().compute(&rows).unwrap();
        assert_eq!(stats.agreement.total, 4);
    }

    #[test]
    fn test_canonicalizes_mood_text() {
        let stats = StatsEngine::default()
            .compute(&[row(" Happy ", "HAPPY")])
            .unwrap();
        assert_eq!(stats.agreement.agree, 1);
    }

    #[test]
    fn test_degenerate_corpus() {
        let err = StatsEngine::default()
            .compute(&[row("joy", "sad"), CorpusRow::default()])
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateCorpus { total_rows: 2 }));
        assert!(matches!(
            StatsEngine::default().compute(&[]),
            Err(Error::DegenerateCorpus { total_rows: 0 })
        ));
    }

    #[test]
    fn test_distribution_sums_to_hundred() {
        let stats = StatsEngine::default().compute(&scenario()).unwrap();
        let audio: f64 = stats.distribution.iter().map(|d| d.audio).sum();
        let lyrics: f64 = stats.distribution.iter().map(|d| d.lyrics).sum();
        assert!((audio - 100.0).abs() < 0.5);
        assert!((lyrics - 100.0).abs() < 0.5);
        let chill = stats.distribution.iter().find(|d| d.mood == "Chill").unwrap();
        assert_eq!(chill.lyrics, 50.0);
    }

    #[test]
    fn test_confidence_bins() {
        assert_eq!(confidence_bin(0.0), 0);
        assert_eq!(confidence_bin(0.19), 0);
        assert_eq!(confidence_bin(0.2), 1);
        assert_eq!(confidence_bin(0.79), 3);
        assert_eq!(confidence_bin(0.8), 4);
        assert_eq!(confidence_bin(1.0), 4);
    }

    #[test]
    fn test_histogram_skips_and_clips() {
        let mut rows = scenario();
        rows[0].audio_confidence = None;
        rows[1].audio_confidence = Some(f64::NAN);
        rows[2].audio_confidence = Some(1.7);
        rows[3].audio_confidence = Some(-3.0);
        let stats = StatsEngine::default().compute(&rows).unwrap();

        let audio: Vec<usize> = stats
            .confidence_distribution
            .iter()
            .map(|b| b.audio_count)
            .collect();
        assert_eq!(audio, vec![1, 0, 0, 0, 1]);
        let lyrics_total: usize = stats
            .confidence_distribution
            .iter()
            .map(|b| b.lyrics_count)
            .sum();
        assert_eq!(lyrics_total, 4);
    }

    #[test]
    fn test_histogram_clips_infinite_confidence() {
        let mut rows = scenario();
        rows[0].audio_confidence = Some(f64::INFINITY);
        rows[1].audio_confidence = Some(f64::NEG_INFINITY);
        rows[2].audio_confidence = Some(0.5);
        rows[3].audio_confidence = Some(f64::NAN);
        let stats = StatsEngine::default().compute(&rows).unwrap();

        let audio: Vec<usize> = stats
            .confidence_distribution
            .iter()
            .map(|b| b.audio_count)
            .collect();
        assert_eq!(audio, vec![1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_low_confidence_per_mood() {
        let mut rows = scenario();
        rows[0].audio_confidence = Some(0.2);
        rows.push(CorpusRow {
            audio_confidence: Some(0.9),
            ..row("happy", "sad")
        });
        let stats = StatsEngine::default().compute(&rows).unwrap();
        let happy = stats.low_confidence.iter().find(|r| r.mood == "Happy").unwrap();
        assert_eq!(happy.audio, 50.0);
        // Lyrics confidence 0.7 is above the 0.6 threshold everywhere
        assert!(stats.low_confidence.iter().all(|r| r.lyrics == 0.0));
    }

    #[test]
    fn test_outputs_bounded_for_adversarial_rows() {
        let mut rows = Vec::new();
        for (i, value) in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e308, -1e308]
            .into_iter()
            .enumerate()
        {
            let mood = Mood::ALL[i % 4].as_str();
            rows.push(CorpusRow {
                audio_confidence: Some(value),
                lyrics_confidence: Some(value),
                ..row(mood, mood)
            });
        }
        let stats = StatsEngine::default().compute(&rows).unwrap();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("NaN") && !json.contains("inf"));

        for share in stats.distribution.iter().chain(&stats.low_confidence) {
            assert!((0.0..=100.0).contains(&share.audio));
            assert!((0.0..=100.0).contains(&share.lyrics));
        }
        let agree = stats.agreement.agree_pct + stats.agreement.disagree_pct;
        assert!((agree - 100.0).abs() < 0.2);
    }

    #[test]
    fn test_compare_report() {
        let mut rows = scenario();
        rows.push(row("sad", "chill"));
        rows[0].mood = Some("happy".into());
        rows[1].mood = Some("chill".into());
        let report = StatsEngine::default().compare(&rows).unwrap();

        assert_eq!(report.disagreements[0].audio, Mood::Sad);
        assert_eq!(report.disagreements[0].lyrics, Mood::Chill);
        assert_eq!(report.disagreements[0].count, 2);

        let sad = report.per_mood.iter().find(|m| m.mood == "Sad").unwrap();
        assert_eq!((sad.audio_count, sad.agree_count, sad.agree_pct), (2, 0, 0.0));

        let accuracy = report.accuracy.unwrap();
        assert_eq!(accuracy.rows, 2);
        assert_eq!(accuracy.audio_pct, 50.0);
        assert_eq!(accuracy.lyrics_pct, 100.0);
        assert_eq!(accuracy.gap_pct, -50.0);
    }

    #[test]
    fn test_dataset_distribution() {
        use crate::normalizer::{normalize_frame, RawFrame};

        let mut frame = RawFrame::new(["energy", "mood"]);
        for label in ["happy", "joy", "sad", "confusion", "hyped"] {
            frame.push_row(["0.5", label]);
        }
        let dist = dataset_distribution(&normalize_frame(&frame)).unwrap();
        assert_eq!(dist.total, 4);
        assert_eq!(dist.distribution[0].mood, "happy");
        assert_eq!(dist.distribution[0].count, 2);
        assert_eq!(dist.distribution[0].percentage, 50.0);

        let mut unlabeled = RawFrame::new(["energy"]);
        unlabeled.push_row(["0.1"]);
        assert!(matches!(
            dataset_distribution(&normalize_frame(&unlabeled)),
            Err(Error::Schema { .. })
        ));
    }
}
