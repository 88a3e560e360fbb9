//! Compound sentiment scoring
//!
//! [`VaderAnalyzer`] wraps the VADER rule set and its full valence lexicon
//! (boosters, negation, caps emphasis, "but" shifts, punctuation). The
//! compound score is the lexicon sum squashed into [-1, 1] as
//! `s / sqrt(s² + 15)`.

use vader_sentiment::SentimentIntensityAnalyzer;

/// Polarity breakdown of one text
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SentimentScores {
    /// Normalized polarity in [-1, 1]
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

/// Source of a compound polarity score
pub trait SentimentAnalyzer: Send + Sync {
    fn polarity(&self, text: &str) -> SentimentScores;

    fn compound(&self, text: &str) -> f64 {
        self.polarity(text).compound
    }
}

/// VADER analyzer over the bundled lexicon
pub struct VaderAnalyzer {
    inner: SentimentIntensityAnalyzer<'static>,
}

impl Default for VaderAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl VaderAnalyzer {
    pub fn new() -> Self {
        Self {
            inner: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl std::fmt::Debug for VaderAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaderAnalyzer").finish()
    }
}

impl SentimentAnalyzer for VaderAnalyzer {
    fn polarity(&self, text: &str) -> SentimentScores {
        if text.trim().is_empty() {
            return SentimentScores::default();
        }
        let scores = self.inner.polarity_scores(text);
        let get = |key: &str| scores.get(key).copied().map(finite).unwrap_or(0.0);
        SentimentScores {
            compound: get("compound").clamp(-1.0, 1.0),
            positive: get("pos"),
            negative: get("neg"),
            neutral: get("neu"),
        }
    }
}

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(text: &str) -> f64 {
        VaderAnalyzer::new().compound(text)
    }

    fn assert_compound(text: &str, expected: f64) {
        let actual = compound(text);
        assert!(
            (actual - expected).abs() < 1e-3,
            "{:?}: expected {} got {}",
            text,
            expected,
            actual
        );
    }

    #[test]
    fn test_reference_compounds() {
        assert_compound("VADER is smart, handsome, and funny.", 0.8316);
        assert_compound("VADER is smart, handsome, and funny!", 0.8439);
        assert_compound("The book was good.", 0.4404);
    }

    #[test]
    fn test_empty_and_neutral_text() {
        assert_eq!(compound(""), 0.0);
        assert_eq!(compound("the table is made of wood"), 0.0);
    }

    #[test]
    fn test_polarity_direction() {
        assert!(compound("I love this beautiful happy day") > 0.5);
        assert!(compound("I cry alone in pain and sorrow") < -0.5);
    }

    #[test]
    fn test_negation_flips() {
        assert!(compound("I am happy") > 0.0);
        assert!(compound("I am not happy") < 0.0);
    }

    #[test]
    fn test_exclamation_emphasis() {
        assert!(compound("great!!!") > compound("great"));
    }

    #[test]
    fn test_scores_sum_to_one() {
        let scores = VaderAnalyzer::new().polarity("happy sad table chair");
        let total = scores.positive + scores.negative + scores.neutral;
        assert!((total - 1.0).abs() < 1e-2);
    }
}
