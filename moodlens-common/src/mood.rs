//! The shared four-mood classification target
//!
//! Both the audio model and the lyrics heuristic predict one of these moods.
//! Raw labels are canonicalized (trimmed + lowercased) before comparison;
//! anything that does not name one of the four moods is rejected rather than
//! coerced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Song mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Chill,
    Sad,
    Hyped,
}

impl Mood {
    /// All moods in dashboard order (happy, chill, sad, hyped)
    ///
    /// Statistics tables, confusion matrix rows and columns all use this order.
    pub const ALL: [Mood; 4] = [Mood::Happy, Mood::Chill, Mood::Sad, Mood::Hyped];

    /// Number of moods
    pub const COUNT: usize = 4;

    /// Canonicalize a raw label: trim, lowercase, then match exactly.
    ///
    /// Returns `None` for empty strings, `"nan"` and anything that is not one
    /// of the four moods.
    pub fn parse(raw: &str) -> Option<Mood> {
        match raw.trim().to_lowercase().as_str() {
            "happy" => Some(Mood::Happy),
            "chill" => Some(Mood::Chill),
            "sad" => Some(Mood::Sad),
            "hyped" => Some(Mood::Hyped),
            _ => None,
        }
    }

    /// Lowercase canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Chill => "chill",
            Mood::Sad => "sad",
            Mood::Hyped => "hyped",
        }
    }

    /// Capitalized display name used by the dashboard tables ("Happy")
    pub fn display_name(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Chill => "Chill",
            Mood::Sad => "Sad",
            Mood::Hyped => "Hyped",
        }
    }

    /// Position within [`Mood::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Mood::Happy => 0,
            Mood::Chill => 1,
            Mood::Sad => 2,
            Mood::Hyped => 3,
        }
    }

    /// Sorted (alphabetical) label list, the ordering stored in model artifacts
    pub fn sorted_labels() -> Vec<Mood> {
        let mut labels = Mood::ALL.to_vec();
        labels.sort_by_key(|m| m.as_str());
        labels
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::parse(s).ok_or_else(|| Error::InvalidInput(format!("Unknown mood: '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalizes_case_and_whitespace() {
        assert_eq!(Mood::parse("  Happy "), Some(Mood::Happy));
        assert_eq!(Mood::parse("HYPED"), Some(Mood::Hyped));
        assert_eq!(Mood::parse("chill\n"), Some(Mood::Chill));
    }

    #[test]
    fn test_parse_rejects_unknown_labels() {
        assert_eq!(Mood::parse("confusion"), None);
        assert_eq!(Mood::parse("nan"), None);
        assert_eq!(Mood::parse(""), None);
        assert_eq!(Mood::parse("joy"), None);
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, mood) in Mood::ALL.iter().enumerate() {
            assert_eq!(mood.index(), i);
        }
    }

    #[test]
    fn test_sorted_labels_alphabetical() {
        assert_eq!(
            Mood::sorted_labels(),
            vec![Mood::Chill, Mood::Happy, Mood::Hyped, Mood::Sad]
        );
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Mood::Sad).unwrap();
        assert_eq!(json, "\"sad\"");
        let back: Mood = serde_json::from_str("\"hyped\"").unwrap();
        assert_eq!(back, Mood::Hyped);
    }

    #[test]
    fn test_from_str_error() {
        assert!("pink".parse::<Mood>().is_err());
        assert_eq!("Sad".parse::<Mood>().unwrap(), Mood::Sad);
    }
}
