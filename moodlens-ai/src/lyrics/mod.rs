//! Lyrics path: sentiment analysis plus the mood rule engine

pub mod heuristic;
pub mod sentiment;

pub use heuristic::{LyricsClassifier, LyricsScore};
pub use sentiment::{SentimentAnalyzer, SentimentScores, VaderAnalyzer};
