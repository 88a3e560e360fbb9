//! Agreement/Reconciliation Engine
//!
//! Pure merge of one audio inference and an optional lyrics prediction into a
//! [`ReconciledVerdict`]. No I/O; inputs are never mutated.
//!
//! - `agree` is `Some(true/false)` only when both predictions exist; a missing
//!   lyrics prediction yields `None`, never `Some(false)`
//! - `top_two_combo` is `"primary|second"` when the audio call is borderline,
//!   otherwise just the primary mood

use moodlens_common::config::Thresholds;
use moodlens_common::{Mood, Prediction};
use serde::{Deserialize, Serialize};

use crate::classifier::Inference;

/// Song identity carried alongside a verdict
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongIdentity {
    pub song: String,
    pub artist: String,
}

/// Merged per-song output of both models
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledVerdict {
    pub identity: SongIdentity,
    pub audio: Inference,
    pub lyrics: Option<Prediction>,
    pub agree: Option<bool>,
    /// `None` when the audio confidence is unavailable
    pub audio_low_confidence: Option<bool>,
    pub lyrics_low_confidence: Option<bool>,
    pub audio_borderline: bool,
    pub top_two_combo: String,
}

/// Agreement of two moods; unknown when the second is absent
pub fn agreement(audio: Mood, lyrics: Option<Mood>) -> Option<bool> {
    lyrics.map(|l| l == audio)
}

/// Raw-string agreement (CSV corpora). Both sides are canonicalized first;
/// anything that is not one of the four moods makes the result unknown.
pub fn agreement_raw(audio: &str, lyrics: &str) -> Option<bool> {
    match (Mood::parse(audio), Mood::parse(lyrics)) {
        (Some(a), Some(l)) => Some(a == l),
        _ => None,
    }
}

/// `"primary|second"` when borderline with a known runner-up, else the primary mood
pub fn top_two_combo(prediction: &Prediction, borderline: bool) -> String {
    match (borderline, prediction.second_choice) {
        (true, Some(second)) => format!("{}|{}", prediction.mood, second),
        _ => prediction.mood.to_string(),
    }
}

/// Applies the configured thresholds to prediction pairs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciler {
    thresholds: Thresholds,
}

impl Reconciler {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn reconcile(
        &self,
        identity: SongIdentity,
        audio: Inference,
        lyrics: Option<Prediction>,
    ) -> ReconciledVerdict {
        let t = &self.thresholds;
        let (audio_low_confidence, audio_borderline, top_two_combo) = match audio.prediction() {
            Some(p) => {
                let borderline = p.is_borderline(t.borderline_margin);
                (
                    Some(p.is_low_confidence(t.audio_low_confidence)),
                    borderline,
                    top_two_combo(p, borderline),
                )
            }
            None => (None, false, audio.mood().to_string()),
        };

        ReconciledVerdict {
            agree: agreement(audio.mood(), lyrics.map(|l| l.mood)),
            lyrics_low_confidence: lyrics.map(|l| l.is_low_confidence(t.lyrics_low_confidence)),
            identity,
            audio,
            lyrics,
            audio_low_confidence,
            audio_borderline,
            top_two_combo,
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
