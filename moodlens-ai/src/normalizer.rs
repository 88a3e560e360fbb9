//! Feature Normalizer
//!
//! Harmonizes the column names and units of the historical dataset variants
//! into one canonical schema:
//! - 9 audio features (see [`Feature`])
//! - `mood` (canonical mood, mapped from raw emotion labels)
//! - identity fields (`track_name`, `artists`) and the lyrics text
//!
//! Matching is driven by the static alias tables below; the first alias
//! present in a frame wins. Columns that leak the target ("Good for ...",
//! "Similar ...", "Similarity Score ...", "Album") are dropped before any
//! alias lookup so they can never be picked up as a feature source.
//!
//! Normalization never fails. Malformed cells become missing values and the
//! caller decides what to do from [`FeatureRecord::missing_count`].

use moodlens_common::numeric::parse_number;
use moodlens_common::Mood;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

// ============================================================================
// Canonical feature schema
// ============================================================================

/// Canonical audio feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Tempo,
    Energy,
    Valence,
    Loudness,
    Danceability,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
}

impl Feature {
    /// All features in wishlist order (the default training column order)
    pub const ALL: [Feature; 9] = [
        Feature::Tempo,
        Feature::Energy,
        Feature::Valence,
        Feature::Loudness,
        Feature::Danceability,
        Feature::Speechiness,
        Feature::Acousticness,
        Feature::Instrumentalness,
        Feature::Liveness,
    ];

    pub const COUNT: usize = 9;

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Tempo => "tempo",
            Feature::Energy => "energy",
            Feature::Valence => "valence",
            Feature::Loudness => "loudness",
            Feature::Danceability => "danceability",
            Feature::Speechiness => "speechiness",
            Feature::Acousticness => "acousticness",
            Feature::Instrumentalness => "instrumentalness",
            Feature::Liveness => "liveness",
        }
    }

    fn index(&self) -> usize {
        Feature::ALL
            .iter()
            .position(|f| f == self)
            .unwrap_or_default()
    }

    /// Resolve a column name through the alias table
    pub fn from_alias(name: &str) -> Option<Feature> {
        FEATURE_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&name))
            .map(|(feature, _)| *feature)
            .or_else(|| {
                LOUDNESS_SOURCE_ALIASES
                    .contains(&name)
                    .then_some(Feature::Loudness)
            })
    }

    /// Canonical names of all features, in wishlist order
    pub fn names() -> Vec<&'static str> {
        Feature::ALL.iter().map(Feature::as_str).collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Alias tables
// ============================================================================

/// Canonical feature → accepted source column names, in priority order
pub const FEATURE_ALIASES: &[(Feature, &[&str])] = &[
    (Feature::Tempo, &["tempo", "Tempo"]),
    (Feature::Energy, &["energy", "Energy"]),
    (Feature::Valence, &["valence", "Valence", "Positiveness"]),
    (Feature::Loudness, &["loudness", "Loudness"]),
    (Feature::Danceability, &["danceability", "Danceability"]),
    (Feature::Speechiness, &["speechiness", "Speechiness"]),
    (Feature::Acousticness, &["acousticness", "Acousticness"]),
    (Feature::Instrumentalness, &["instrumentalness", "Instrumentalness"]),
    (Feature::Liveness, &["liveness", "Liveness"]),
];

/// Unit-suffixed loudness columns, used when plain `loudness` is absent or empty
pub const LOUDNESS_SOURCE_ALIASES: &[&str] = &["Loudness (dB)", "Loudness (db)", "loudness_src"];

pub const TRACK_NAME_ALIASES: &[&str] = &["track_name", "song", "Song", "Track Name", "name"];
pub const ARTIST_ALIASES: &[&str] = &["artists", "Artist(s)", "artist", "Artist", "artist_name"];
pub const LYRICS_ALIASES: &[&str] = &["lyrics", "text", "Lyrics", "Text", "song_text"];
pub const MOOD_ALIASES: &[&str] = &["mood", "Mood", "emotion", "Emotion"];

/// Column-name prefixes that leak the target or add identity noise
const LEAK_PREFIXES: &[&str] = &["Good for ", "Similar ", "Similarity Score"];
const LEAK_EXACT: &[&str] = &["Album"];

/// Canonical column names written by [`CanonicalRow::to_raw`]
pub const MOOD_COLUMN: &str = "mood";
pub const TRACK_NAME_COLUMN: &str = "track_name";
pub const ARTIST_COLUMN: &str = "artists";
pub const LYRICS_COLUMN: &str = "lyrics";

/// Source emotion label → mood. `None` entries are known noise and dropped.
///
/// The four mood names themselves are accepted as-is before this table is
/// consulted; labels found in neither place are dropped too.
const LABEL_MAP: &[(&str, Option<Mood>)] = &[
    ("joy", Some(Mood::Happy)),
    ("surprise", Some(Mood::Happy)),
    ("interest", Some(Mood::Happy)),
    ("love", Some(Mood::Chill)),
    ("sadness", Some(Mood::Sad)),
    ("anger", Some(Mood::Hyped)),
    ("angry", Some(Mood::Hyped)),
    ("fear", Some(Mood::Hyped)),
    ("thirst", Some(Mood::Hyped)),
    ("true", None),
    ("pink", None),
    ("confusion", None),
];

/// Map a raw dataset label to a mood; unrecognized labels yield `None`.
pub fn map_raw_label(raw: &str) -> Option<Mood> {
    if let Some(mood) = Mood::parse(raw) {
        return Some(mood);
    }
    let key = raw.trim().to_lowercase();
    LABEL_MAP
        .iter()
        .find(|(label, _)| *label == key)
        .and_then(|(_, mood)| *mood)
}

/// True when a column must be removed before feature lookup
pub fn is_leaking_column(name: &str) -> bool {
    LEAK_EXACT.contains(&name) || LEAK_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Parse a loudness cell such as `"-5.2 dB"` or `"−7,1dB"` into dBFS.
///
/// Normalizes the unicode minus sign, strips the dB suffix and any other
/// non-numeric characters, then clamps to [-60, 0]. Values outside that range
/// are data-entry errors and are clamped rather than rejected.
pub fn clean_loudness(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace('\u{2212}', "-");
    let without_unit = strip_decibel_suffix(&normalized);
    let numeric: String = without_unit
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();
    parse_number(&numeric).map(|v| v.clamp(-60.0, 0.0))
}

fn strip_decibel_suffix(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let chars: Vec<char> = value.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if i + 1 < chars.len()
            && chars[i].eq_ignore_ascii_case(&'d')
            && chars[i + 1].eq_ignore_ascii_case(&'b')
        {
            i += 2;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

// ============================================================================
// Frames and records
// ============================================================================

/// Raw tabular input: named columns of string cells. An empty cell is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawFrame {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with missing cells, long rows truncated
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Single-row frame from a name → value map (API payloads)
    pub fn from_record(record: &BTreeMap<String, String>) -> Self {
        let mut frame = RawFrame::new(record.keys().cloned());
        frame.push_row(record.values().cloned());
        frame
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First alias present as a column (alias order decides, not column order)
    pub fn find_column(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.column_index(alias))
    }

    /// Cell value, `None` when blank
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn column_has_values(&self, column: usize) -> bool {
        (0..self.rows.len()).any(|r| self.cell(r, column).is_some())
    }
}

/// The 9 canonical features of one song. `None` marks a missing value,
/// which is distinct from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    values: [Option<f64>; Feature::COUNT],
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    /// Non-finite values are stored as missing
    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        self.values[feature.index()] = value.filter(|v| v.is_finite());
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn missing_features(&self) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// Values in the given column order (artifact feature order)
    pub fn ordered(&self, order: &[Feature]) -> Vec<Option<f64>> {
        order.iter().map(|f| self.get(*f)).collect()
    }

    /// Values with an explicit default for missing entries.
    ///
    /// Only for callers that skip imputation; accuracy degrades.
    pub fn ordered_with_fallback(&self, order: &[Feature], fallback: f64) -> Vec<f64> {
        order.iter().map(|f| self.get(*f).unwrap_or(fallback)).collect()
    }

    /// Build from loosely named JSON-ish numbers; unknown names are ignored
    pub fn from_named<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut record = FeatureRecord::new();
        for (name, value) in values {
            if let Some(feature) = Feature::from_alias(name) {
                if record.get(feature).is_none() {
                    record.set(feature, Some(value));
                }
            }
        }
        record
    }
}

/// One normalized row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRow {
    pub features: FeatureRecord,
    /// Canonical mood, `None` when absent or unmapped
    pub mood: Option<Mood>,
    /// Source label text that did not map to a mood
    pub unmapped_label: Option<String>,
    pub track_name: Option<String>,
    pub artists: Option<String>,
    pub lyrics: Option<String>,
}

impl CanonicalRow {
    /// Render back into canonical column names (the normalizer's fixed point)
    pub fn to_raw(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for feature in Feature::ALL {
            let cell = self
                .features
                .get(feature)
                .map(|v| v.to_string())
                .unwrap_or_default();
            out.insert(feature.as_str().to_string(), cell);
        }
        let mood_cell = match (&self.mood, &self.unmapped_label) {
            (Some(mood), _) => mood.as_str().to_string(),
            (None, Some(label)) => label.clone(),
            (None, None) => String::new(),
        };
        out.insert(MOOD_COLUMN.to_string(), mood_cell);
        out.insert(
            TRACK_NAME_COLUMN.to_string(),
            self.track_name.clone().unwrap_or_default(),
        );
        out.insert(
            ARTIST_COLUMN.to_string(),
            self.artists.clone().unwrap_or_default(),
        );
        out.insert(
            LYRICS_COLUMN.to_string(),
            self.lyrics.clone().unwrap_or_default(),
        );
        out
    }
}

/// Normalizer output for a whole frame
#[derive(Debug, Clone, Default)]
pub struct NormalizedFrame {
    pub rows: Vec<CanonicalRow>,
    /// Features that had a usable source column, in wishlist order
    pub present_features: Vec<Feature>,
    /// Column names dropped as leaking
    pub dropped_columns: Vec<String>,
    /// Source column the lyrics were read from
    pub lyrics_column: Option<String>,
    /// Source column the labels were read from
    pub mood_column: Option<String>,
    /// Original column names (for schema diagnostics)
    pub source_columns: Vec<String>,
}

impl NormalizedFrame {
    /// Rows whose label did not map to one of the four moods
    pub fn unmapped_label_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.unmapped_label.is_some())
            .count()
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Column indices chosen for one frame
struct ColumnPlan {
    features: Vec<(Feature, usize, bool)>,
    track_name: Option<usize>,
    artists: Option<usize>,
    lyrics: Option<usize>,
    mood: Option<usize>,
}

/// Restrict a frame to the canonical schema
pub fn normalize_frame(frame: &RawFrame) -> NormalizedFrame {
    let dropped_columns: Vec<String> = frame
        .columns()
        .iter()
        .filter(|c| is_leaking_column(c))
        .cloned()
        .collect();
    if !dropped_columns.is_empty() {
        debug!(dropped = ?dropped_columns, "Dropping leaking columns");
    }

    let plan = plan_columns(frame);

    let rows = (0..frame.len())
        .map(|r| {
            let mut features = FeatureRecord::new();
            for (feature, column, needs_cleaning) in &plan.features {
                let value = frame.cell(r, *column).and_then(|cell| {
                    if *needs_cleaning {
                        clean_loudness(cell)
                    } else {
                        parse_number(cell)
                    }
                });
                features.set(*feature, value);
            }

            let label = plan.mood.and_then(|c| frame.cell(r, c)).map(str::trim);
            let mood = label.and_then(map_raw_label);
            let unmapped_label = match (mood, label) {
                (None, Some(label)) => Some(label.to_string()),
                _ => None,
            };

            CanonicalRow {
                features,
                mood,
                unmapped_label,
                track_name: plan.track_name.and_then(|c| frame.cell(r, c)).map(str::to_string),
                artists: plan.artists.and_then(|c| frame.cell(r, c)).map(str::to_string),
                lyrics: plan.lyrics.and_then(|c| frame.cell(r, c)).map(str::to_string),
            }
        })
        .collect();

    let mut present_features: Vec<Feature> = plan.features.iter().map(|(f, _, _)| *f).collect();
    present_features.sort_by_key(|f| f.index());

    NormalizedFrame {
        rows,
        present_features,
        dropped_columns,
        lyrics_column: plan.lyrics.map(|c| frame.columns()[c].clone()),
        mood_column: plan.mood.map(|c| frame.columns()[c].clone()),
        source_columns: frame.columns().to_vec(),
    }
}

/// Normalize a single name → value record
pub fn normalize_record(record: &BTreeMap<String, String>) -> CanonicalRow {
    normalize_frame(&RawFrame::from_record(record))
        .rows
        .pop()
        .unwrap_or_default()
}

fn plan_columns(frame: &RawFrame) -> ColumnPlan {
    let usable = |aliases: &[&str]| -> Option<usize> {
        aliases
            .iter()
            .filter(|a| !is_leaking_column(a))
            .find_map(|alias| frame.column_index(alias))
    };

    let mut features = Vec::with_capacity(Feature::COUNT);
    for (feature, aliases) in FEATURE_ALIASES {
        let column = usable(*aliases);
        if *feature == Feature::Loudness {
            // Plain loudness wins unless it is absent or entirely empty
            match column {
                Some(c) if frame.column_has_values(c) => features.push((*feature, c, false)),
                _ => {
                    let source = LOUDNESS_SOURCE_ALIASES
                        .iter()
                        .filter_map(|alias| frame.column_index(alias))
                        .find(|c| frame.column_has_values(*c));
                    match (source, column) {
                        (Some(src), _) => features.push((*feature, src, true)),
                        (None, Some(c)) => features.push((*feature, c, false)),
                        (None, None) => {}
                    }
                }
            }
        } else if let Some(c) = column {
            features.push((*feature, c, false));
        }
    }

    ColumnPlan {
        features,
        track_name: usable(TRACK_NAME_ALIASES),
        artists: usable(ARTIST_ALIASES),
        lyrics: usable(LYRICS_ALIASES),
        mood: usable(MOOD_ALIASES),
    }
}
