//! # MoodLens Common Library
//!
//! Shared code for the MoodLens crates:
//! - The four-mood vocabulary and label canonicalization
//! - The `Prediction` value shared by the audio and lyrics models
//! - Numeric sanitization helpers (NaN/Infinity guards, clamping)
//! - Configuration loading (TOML + environment overrides)
//! - Common error type

pub mod config;
pub mod error;
pub mod mood;
pub mod numeric;
pub mod prediction;

pub use error::{Error, Result};
pub use mood::Mood;
pub use prediction::Prediction;
