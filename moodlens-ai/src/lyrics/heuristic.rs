//! Lyrics Mood Heuristic
//!
//! Maps a compound sentiment score to a mood with a magnitude-derived
//! confidence. Bands (defaults, first match wins):
//!
//! | compound            | mood               | confidence                      |
//! |---------------------|--------------------|---------------------------------|
//! | > 0.5               | happy              | compound                        |
//! | (0.1, 0.5]          | chill              | 0.5 + (compound - 0.1) × 0.625  |
//! | < -0.5              | sad                | \|compound\|                    |
//! | [-0.5, -0.1)        | sad if \|c\| > 0.3 | \|c\|, else chill 0.55 + (0.3 - \|c\|) × 0.5 |
//! | [-0.1, 0.1]         | chill              | 0.65                            |
//!
//! An energetic keyword plus compound > 0.2 overrides all bands with
//! `hyped`, confidence `min(0.9, |compound| + 0.2)`.
//!
//! Every call is total: empty lyrics give `(chill, 0.1)`.

use moodlens_common::config::LyricsRules;
use moodlens_common::{Error, Mood, Prediction, Result};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use super::sentiment::{SentimentAnalyzer, VaderAnalyzer};
use crate::normalizer::{RawFrame, ARTIST_ALIASES, LYRICS_ALIASES, TRACK_NAME_ALIASES};

/// Chill band confidence ramp: `CHILL_BASE + (compound - chill_above) * CHILL_SLOPE`
const CHILL_BASE: f64 = 0.5;
const CHILL_SLOPE: f64 = 0.625;
/// Mildly negative chill ramp: `MILD_BASE + (mild_sad_magnitude - |compound|) * MILD_SLOPE`
const MILD_BASE: f64 = 0.55;
const MILD_SLOPE: f64 = 0.5;
/// Confidence used when a computation yields NaN
const NAN_CONFIDENCE: f64 = 0.1;

/// Heuristic output for one song
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LyricsScore {
    pub mood: Mood,
    pub confidence: f64,
    /// `None` when the lyrics were empty and no scoring happened
    pub compound: Option<f64>,
    pub keyword_override: bool,
}

impl LyricsScore {
    pub fn prediction(&self) -> Prediction {
        Prediction::single(self.mood, self.confidence)
    }
}

/// Deterministic sentiment-to-mood rule engine
#[derive(Clone)]
pub struct LyricsClassifier {
    analyzer: Arc<dyn SentimentAnalyzer>,
    rules: LyricsRules,
    keywords: Vec<String>,
}

impl std::fmt::Debug for LyricsClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyricsClassifier")
            .field("rules", &self.rules.version)
            .finish()
    }
}

impl LyricsClassifier {
    /// Classifier over the VADER analyzer
    pub fn new(rules: LyricsRules) -> Self {
        Self::with_analyzer(Arc::new(VaderAnalyzer::new()), rules)
    }

    pub fn with_analyzer(analyzer: Arc<dyn SentimentAnalyzer>, rules: LyricsRules) -> Self {
        let keywords = rules.keywords.iter().map(|k| k.to_lowercase()).collect();
        info!(
            rules = %rules.version,
            keywords = rules.keywords.len(),
            "Lyrics heuristic ready"
        );
        Self {
            analyzer,
            rules,
            keywords,
        }
    }

    pub fn rules(&self) -> &LyricsRules {
        &self.rules
    }

    /// Classify one song. `song` and `artist` only annotate the debug log.
    pub fn classify(
        &self,
        lyrics: Option<&str>,
        song: Option<&str>,
        artist: Option<&str>,
    ) -> LyricsScore {
        let text = match lyrics.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => {
                return LyricsScore {
                    mood: self.rules.empty_mood,
                    confidence: self.rules.empty_confidence,
                    compound: None,
                    keyword_override: false,
                }
            }
        };

        let compound = self.analyzer.compound(text);
        let (mood, confidence, keyword_override) = match self.hype_override(text, compound) {
            Some(confidence) => (Mood::Hyped, confidence, true),
            None => {
                let (mood, confidence) = self.band(compound);
                (mood, confidence, false)
            }
        };
        let confidence = finalize_confidence(confidence);

        debug!(
            song = song.unwrap_or(""),
            artist = artist.unwrap_or(""),
            compound,
            mood = %mood,
            confidence,
            keyword_override,
            "Lyrics classified"
        );

        LyricsScore {
            mood,
            confidence,
            compound: Some(compound),
            keyword_override,
        }
    }

    /// Keyword override confidence, if it applies
    fn hype_override(&self, text: &str, compound: f64) -> Option<f64> {
        if !(compound > self.rules.hype_min_compound) {
            return None;
        }
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && lowered.contains(k.as_str()))
            .then(|| (compound.abs() + self.rules.hype_bonus).min(self.rules.hype_cap))
    }

    /// Threshold table for a compound score
    fn band(&self, compound: f64) -> (Mood, f64) {
        let r = &self.rules;
        let magnitude = compound.abs();
        if compound > r.happy_above {
            (Mood::Happy, compound)
        } else if compound > r.chill_above {
            (Mood::Chill, CHILL_BASE + (compound - r.chill_above) * CHILL_SLOPE)
        } else if compound < r.sad_below {
            (Mood::Sad, magnitude)
        } else if compound < r.mild_negative_below {
            if magnitude > r.mild_sad_magnitude {
                (Mood::Sad, magnitude)
            } else {
                (
                    Mood::Chill,
                    MILD_BASE + (r.mild_sad_magnitude - magnitude) * MILD_SLOPE,
                )
            }
        } else {
            (Mood::Chill, r.neutral_confidence)
        }
    }

    /// Score every row of a frame.
    ///
    /// Fails for the whole frame when no lyrics column exists; empty cells
    /// fall back to the empty-lyrics default.
    pub fn classify_frame(&self, frame: &RawFrame) -> Result<Vec<LyricsScore>> {
        let lyrics_col = frame.find_column(LYRICS_ALIASES).ok_or_else(|| {
            Error::schema(
                LYRICS_ALIASES.iter().copied(),
                frame.columns().iter().cloned(),
            )
        })?;
        let song_col = frame.find_column(TRACK_NAME_ALIASES);
        let artist_col = frame.find_column(ARTIST_ALIASES);

        let scores = (0..frame.len())
            .into_par_iter()
            .map(|r| {
                self.classify(
                    frame.cell(r, lyrics_col),
                    song_col.and_then(|c| frame.cell(r, c)),
                    artist_col.and_then(|c| frame.cell(r, c)),
                )
            })
            .collect();
        Ok(scores)
    }
}

fn finalize_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        NAN_CONFIDENCE
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::sentiment::SentimentScores;

    /// Analyzer returning a fixed compound score
    struct Fixed(f64);

    impl SentimentAnalyzer for Fixed {
        fn polarity(&self, _text: &str) -> SentimentScores {
            SentimentScores {
                compound: self.0,
                ..Default::default()
            }
        }
    }

    fn fixed(compound: f64) -> LyricsClassifier {
        LyricsClassifier::with_analyzer(Arc::new(Fixed(compound)), LyricsRules::default())
    }

    fn classify(compound: f64, text: &str) -> (Mood, f64) {
        let score = fixed(compound).classify(Some(text), None, None);
        (score.mood, score.confidence)
    }

    fn assert_close(actual: (Mood, f64), mood: Mood, confidence: f64) {
        assert_eq!(actual.0, mood);
        assert!(
            (actual.1 - confidence).abs() < 1e-9,
            "expected {} got {}",
            confidence,
            actual.1
        );
    }

    #[test]
    fn test_empty_lyrics_default() {
        let classifier = fixed(0.9);
        for text in [None, Some(""), Some("   \n")] {
            let score = classifier.classify(text, Some("song"), None);
            assert_eq!((score.mood, score.confidence), (Mood::Chill, 0.1));
            assert_eq!(score.compound, None);
        }
    }

    #[test]
    fn test_bands() {
        assert_close(classify(0.8, "calm words"), Mood::Happy, 0.8);
        assert_close(classify(0.3, "calm words"), Mood::Chill, 0.5 + 0.2 * 0.625);
        assert_close(classify(0.5, "calm words"), Mood::Chill, 0.75);
        assert_close(classify(-0.7, "calm words"), Mood::Sad, 0.7);
        assert_close(classify(-0.4, "calm words"), Mood::Sad, 0.4);
        assert_close(classify(-0.2, "calm words"), Mood::Chill, 0.55 + 0.1 * 0.5);
        assert_close(classify(0.05, "calm words"), Mood::Chill, 0.65);
        assert_close(classify(-0.1, "calm words"), Mood::Chill, 0.65);
    }

    #[test]
    fn test_keyword_override() {
        let text = "Let's party all night, turn up the bass";
        assert_close(classify(0.3, text), Mood::Hyped, 0.5);
        assert_close(classify(0.85, text), Mood::Hyped, 0.9);
        // Below the compound gate the bands apply
        assert_close(classify(0.15, text), Mood::Chill, 0.5 + 0.05 * 0.625);
        assert_close(classify(-0.8, text), Mood::Sad, 0.8);
    }

    #[test]
    fn test_keyword_is_substring_match() {
        // "lit" inside "little"
        assert_eq!(classify(0.4, "a little song").0, Mood::Hyped);
    }

    #[test]
    fn test_nan_compound_is_bounded() {
        let score = fixed(f64::NAN).classify(Some("anything"), None, None);
        assert!(score.confidence.is_finite());
        assert!((0.0..=1.0).contains(&score.confidence));
    }

    #[test]
    fn test_party_lyric_with_vader() {
        let classifier = LyricsClassifier::new(LyricsRules::default());
        let lyric = "Party all night, dance with me, so much fun";
        let score = classifier.classify(Some(lyric), None, None);
        assert_eq!(score.mood, Mood::Hyped);
        assert!(score.keyword_override);
    }

    #[test]
    fn test_classify_frame_requires_lyrics_column() {
        let mut frame = RawFrame::new(["track_name", "energy"]);
        frame.push_row(["a", "0.2"]);
        let err = fixed(0.0).classify_frame(&frame).unwrap_err();
        match err {
            Error::Schema { missing, available } => {
                assert!(missing.contains(&"lyrics".to_string()));
                assert_eq!(available, vec!["track_name".to_string(), "energy".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_frame_preserves_order() {
        let mut frame = RawFrame::new(["text"]);
        frame.push_row(["first"]);
        frame.push_row([""]);
        frame.push_row(["third"]);
        let scores = fixed(0.8).classify_frame(&frame).unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].mood, Mood::Happy);
        assert_eq!((scores[1].mood, scores[1].confidence), (Mood::Chill, 0.1));
        assert_eq!(scores[2].mood, Mood::Happy);
    }
}
