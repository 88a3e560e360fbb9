//! Prediction corpus: one flattened row per reconciled song
//!
//! The corpus CSV is the source of truth for dashboard statistics. Reading is
//! lenient: unparseable numbers and flags become `None` so a damaged file
//! still yields statistics over whatever is usable.

use moodlens_common::numeric::parse_number;
use moodlens_common::{Error, Mood, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use crate::dataset::{read_raw_frame, read_raw_frame_from_reader};
use crate::normalizer::RawFrame;
use crate::reconcile::{agreement_raw, ReconciledVerdict};

/// Column names, in file order
pub const CORPUS_COLUMNS: [&str; 14] = [
    "track_name",
    "artists",
    "mood",
    "audio_prediction",
    "audio_confidence",
    "audio_second_choice",
    "audio_margin",
    "audio_low_confidence",
    "audio_borderline",
    "lyrics_prediction",
    "lyrics_confidence",
    "lyrics_low_confidence",
    "agree",
    "top_two_combo",
];

/// Flattened verdict. Mood columns stay as text; the statistics engine decides
/// which rows are admissible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusRow {
    pub track_name: String,
    pub artists: String,
    /// Ground-truth label, when the source dataset had one
    pub mood: Option<String>,
    pub audio_prediction: Option<String>,
    pub audio_confidence: Option<f64>,
    pub audio_second_choice: Option<String>,
    pub audio_margin: Option<f64>,
    pub audio_low_confidence: Option<bool>,
    pub audio_borderline: Option<bool>,
    pub lyrics_prediction: Option<String>,
    pub lyrics_confidence: Option<f64>,
    pub lyrics_low_confidence: Option<bool>,
    /// Empty when unknown
    pub agree: Option<bool>,
    pub top_two_combo: String,
}

impl CorpusRow {
    pub fn from_verdict(verdict: &ReconciledVerdict, true_mood: Option<Mood>) -> Self {
        let audio = verdict.audio.prediction();
        Self {
            track_name: verdict.identity.song.clone(),
            artists: verdict.identity.artist.clone(),
            mood: true_mood.map(|m| m.to_string()),
            audio_prediction: Some(verdict.audio.mood().to_string()),
            audio_confidence: audio.map(|p| p.confidence),
            audio_second_choice: audio.and_then(|p| p.second_choice).map(|m| m.to_string()),
            audio_margin: audio.map(|p| p.margin),
            audio_low_confidence: verdict.audio_low_confidence,
            audio_borderline: audio.map(|_| verdict.audio_borderline),
            lyrics_prediction: verdict.lyrics.map(|p| p.mood.to_string()),
            lyrics_confidence: verdict.lyrics.map(|p| p.confidence),
            lyrics_low_confidence: verdict.lyrics_low_confidence,
            agree: verdict.agree,
            top_two_combo: verdict.top_two_combo.clone(),
        }
    }

    /// Canonical audio mood, if the cell names one
    pub fn audio_mood(&self) -> Option<Mood> {
        self.audio_prediction.as_deref().and_then(Mood::parse)
    }

    pub fn lyrics_mood(&self) -> Option<Mood> {
        self.lyrics_prediction.as_deref().and_then(Mood::parse)
    }

    pub fn true_mood(&self) -> Option<Mood> {
        self.mood.as_deref().and_then(Mood::parse)
    }
}

/// Write the corpus atomically (temp file + rename)
pub fn write_corpus_csv(rows: &[CorpusRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("csv.tmp");
    let file = std::fs::File::create(&temp_path)?;
    write_corpus(rows, file)?;
    std::fs::rename(&temp_path, path)?;
    info!(path = %path.display(), rows = rows.len(), "Wrote prediction corpus");
    Ok(())
}

/// Serialize rows as CSV with a header
pub fn write_corpus<W: Write>(rows: &[CorpusRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer
            .write_record(CORPUS_COLUMNS)
            .map_err(|e| Error::Csv(e.to_string()))?;
    }
    for row in rows {
        csv_writer
            .serialize(row)
            .map_err(|e| Error::Csv(e.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read a corpus file. A missing file is `Error::Io(NotFound)`.
pub fn read_corpus_csv(path: &Path) -> Result<Vec<CorpusRow>> {
    corpus_from_frame(&read_raw_frame(path)?)
}

pub fn read_corpus<R: Read>(reader: R) -> Result<Vec<CorpusRow>> {
    corpus_from_frame(&read_raw_frame_from_reader(reader)?)
}

/// Lenient conversion; only the two prediction columns are required
pub fn corpus_from_frame(frame: &RawFrame) -> Result<Vec<CorpusRow>> {
    let required = ["audio_prediction", "lyrics_prediction"];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| frame.column_index(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Error::schema(missing, frame.columns().iter().cloned()));
    }

    let columns: Vec<Option<usize>> = CORPUS_COLUMNS
        .iter()
        .map(|c| frame.column_index(c))
        .collect();
    let cell = |r: usize, i: usize| columns[i].and_then(|c| frame.cell(r, c));
    let text = |r: usize, i: usize| cell(r, i).map(str::to_string);
    let number = |r: usize, i: usize| cell(r, i).and_then(parse_number);
    let flag = |r: usize, i: usize| cell(r, i).and_then(parse_flag);

    Ok((0..frame.len())
        .map(|r| CorpusRow {
            // Older corpora lack the column; derive it from the two predictions
            agree: match columns[12] {
                Some(_) => flag(r, 12),
                None => agreement_raw(cell(r, 3).unwrap_or(""), cell(r, 9).unwrap_or("")),
            },
            track_name: text(r, 0).unwrap_or_default(),
            artists: text(r, 1).unwrap_or_default(),
            mood: text(r, 2),
            audio_prediction: text(r, 3),
            audio_confidence: number(r, 4),
            audio_second_choice: text(r, 5),
            audio_margin: number(r, 6),
            audio_low_confidence: flag(r, 7),
            audio_borderline: flag(r, 8),
            lyrics_prediction: text(r, 9),
            lyrics_confidence: number(r, 10),
            lyrics_low_confidence: flag(r, 11),
            top_two_combo: text(r, 13).unwrap_or_default(),
        })
        .collect())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
