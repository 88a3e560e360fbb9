//! Dataset loading and preparation
//!
//! CSV → [`RawFrame`] → [`NormalizedFrame`] → [`LabeledDataset`], plus the
//! seeded sampling helpers used by training: per-class downsampling,
//! stratified train/validation/test splitting and stratified k-fold.

use moodlens_common::config::SplitPolicy;
use moodlens_common::{Error, Mood, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::normalizer::{
    Feature, NormalizedFrame, RawFrame, ARTIST_COLUMN, LYRICS_COLUMN, MOOD_COLUMN,
    TRACK_NAME_COLUMN,
};

// ============================================================================
// CSV input
// ============================================================================

/// Read a CSV file into a raw frame. A missing file is an `Io` error.
pub fn read_raw_frame(path: &Path) -> Result<RawFrame> {
    let file = std::fs::File::open(path)?;
    let frame = read_raw_frame_from_reader(file)
        .map_err(|e| Error::Csv(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), rows = frame.len(), "Loaded CSV");
    Ok(frame)
}

/// Read CSV text from any reader (header row required)
pub fn read_raw_frame_from_reader<R: Read>(reader: R) -> Result<RawFrame> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| Error::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut frame = RawFrame::new(headers);
    for record in csv_reader.records() {
        let record = record.map_err(|e| Error::Csv(e.to_string()))?;
        frame.push_row(record.iter());
    }
    Ok(frame)
}

/// Write the mapped dataset: identity columns, present features, lyrics (when
/// the source had them) and the canonical mood. Rows whose label did not map
/// are left out. Returns the number of rows written.
pub fn write_mapped<W: Write>(frame: &NormalizedFrame, writer: W) -> Result<usize> {
    let mut header = vec![TRACK_NAME_COLUMN, ARTIST_COLUMN];
    header.extend(frame.present_features.iter().map(|f| f.as_str()));
    let with_lyrics = frame.lyrics_column.is_some();
    if with_lyrics {
        header.push(LYRICS_COLUMN);
    }
    header.push(MOOD_COLUMN);

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(&header)
        .map_err(|e| Error::Csv(e.to_string()))?;

    let mut written = 0;
    for row in &frame.rows {
        let Some(mood) = row.mood else { continue };
        let mut record = vec![
            row.track_name.clone().unwrap_or_default(),
            row.artists.clone().unwrap_or_default(),
        ];
        record.extend(frame.present_features.iter().map(|f| {
            row.features
                .get(*f)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        if with_lyrics {
            record.push(row.lyrics.clone().unwrap_or_default());
        }
        record.push(mood.as_str().to_string());
        csv_writer
            .write_record(&record)
            .map_err(|e| Error::Csv(e.to_string()))?;
        written += 1;
    }
    csv_writer.flush()?;
    Ok(written)
}

/// [`write_mapped`] to a file, atomically (temp file + rename)
pub fn write_mapped_csv(frame: &NormalizedFrame, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("csv.tmp");
    let written = write_mapped(frame, std::fs::File::create(&temp_path)?)?;
    std::fs::rename(&temp_path, path)?;
    info!(
        path = %path.display(),
        rows = written,
        dropped = frame.unmapped_label_count(),
        "Wrote mapped dataset"
    );
    Ok(written)
}

// ============================================================================
// Labeled dataset
// ============================================================================

/// Feature matrix with mood labels, restricted to the selected feature columns
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    /// Column order of `rows` (wishlist order)
    pub features: Vec<Feature>,
    pub rows: Vec<Vec<Option<f64>>>,
    pub labels: Vec<Mood>,
}

impl LabeledDataset {
    /// Select training rows and columns from a normalized frame.
    ///
    /// Fails with `Schema` when no label column or no usable feature exists,
    /// and with `DegenerateCorpus` when every label was unmapped.
    pub fn from_frame(frame: &NormalizedFrame) -> Result<Self> {
        if frame.mood_column.is_none() {
            return Err(Error::schema(["mood"], frame.source_columns.iter().cloned()));
        }

        let labeled: Vec<_> = frame.rows.iter().filter(|r| r.mood.is_some()).collect();
        let dropped = frame.rows.len() - labeled.len();
        if labeled.is_empty() {
            return Err(Error::DegenerateCorpus {
                total_rows: frame.rows.len(),
            });
        }

        let features: Vec<Feature> = frame
            .present_features
            .iter()
            .copied()
            .filter(|f| labeled.iter().any(|r| r.features.get(*f).is_some()))
            .collect();
        if features.is_empty() {
            return Err(Error::schema(
                Feature::names(),
                frame.source_columns.iter().cloned(),
            ));
        }

        let rows = labeled.iter().map(|r| r.features.ordered(&features)).collect();
        let labels = labeled.iter().filter_map(|r| r.mood).collect();

        let dataset = Self {
            features,
            rows,
            labels,
        };
        info!(
            rows = dataset.len(),
            dropped_labels = dropped,
            features = ?dataset.feature_names(),
            classes = ?dataset.class_counts(),
            "Prepared labeled dataset"
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_names(&self) -> Vec<&'static str> {
        self.features.iter().map(Feature::as_str).collect()
    }

    pub fn class_counts(&self) -> BTreeMap<Mood, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }

    /// Rows at `indices`, in the given order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Cap every class at `max_per_class` rows, sampled without replacement.
    ///
    /// Smaller classes are kept whole and original row order is preserved.
    /// `max_per_class == 0` disables the cap.
    pub fn balanced_downsample(&self, max_per_class: usize, seed: u64) -> Self {
        if max_per_class == 0 {
            return self.clone();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut keep = Vec::with_capacity(self.len());
        for (_, mut members) in group_by_class(&self.labels) {
            if members.len() > max_per_class {
                members.shuffle(&mut rng);
                members.truncate(max_per_class);
            }
            keep.extend(members);
        }
        keep.sort_unstable();

        let sampled = self.subset(&keep);
        debug!(
            before = self.len(),
            after = sampled.len(),
            max_per_class,
            "Balanced downsample"
        );
        sampled
    }
}

fn group_by_class(labels: &[Mood]) -> BTreeMap<Mood, Vec<usize>> {
    let mut groups: BTreeMap<Mood, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(*label).or_default().push(i);
    }
    groups
}

// ============================================================================
// Stratified splitting
// ============================================================================

/// Row indices of each partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    /// Empty for [`SplitPolicy::TrainTest`]
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `labels` by `policy`, preserving class proportions in each part
pub fn split_dataset(labels: &[Mood], policy: SplitPolicy, seed: u64) -> DataSplit {
    let (validation_fraction, test_fraction) = policy.fractions();
    let all: Vec<usize> = (0..labels.len()).collect();

    let (rest, test) = stratified_partition(labels, &all, test_fraction, seed);
    if validation_fraction <= 0.0 {
        return DataSplit {
            train: rest,
            validation: Vec::new(),
            test,
        };
    }

    // Validation share of what remains after the test cut
    let relative = validation_fraction / (1.0 - test_fraction);
    let (train, validation) =
        stratified_partition(labels, &rest, relative, seed.wrapping_add(1));
    DataSplit {
        train,
        validation,
        test,
    }
}

/// Split `indices` into (kept, held_out) with `fraction` of every class held out.
///
/// A class with a single member always stays in the kept part.
fn stratified_partition(
    labels: &[Mood],
    indices: &[usize],
    fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut groups: BTreeMap<Mood, Vec<usize>> = BTreeMap::new();
    for &i in indices {
        groups.entry(labels[i]).or_default().push(i);
    }

    let mut kept = Vec::new();
    let mut held_out = Vec::new();
    for (_, mut members) in groups {
        members.shuffle(&mut rng);
        let n = members.len();
        let mut n_out = (n as f64 * fraction).round() as usize;
        if n_out == 0 && fraction > 0.0 && n >= 2 {
            n_out = 1;
        }
        n_out = n_out.min(n.saturating_sub(1));
        held_out.extend_from_slice(&members[..n_out]);
        kept.extend_from_slice(&members[n_out..]);
    }
    kept.sort_unstable();
    held_out.sort_unstable();
    (kept, held_out)
}

/// One cross-validation fold: (train indices, validation indices)
pub type Fold = (Vec<usize>, Vec<usize>);

/// Stratified k-fold assignment.
///
/// Members of each class are shuffled and dealt round-robin across folds, so
/// every fold sees roughly the same class proportions. Folds that end up with
/// no validation rows are skipped.
pub fn stratified_kfold(labels: &[Mood], k: usize, seed: u64) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(Error::Model(format!("cross-validation needs k >= 2, got {}", k)));
    }
    if labels.len() < k {
        return Err(Error::Model(format!(
            "cross-validation needs at least {} rows, got {}",
            k,
            labels.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; labels.len()];
    let mut next_fold = 0;
    for (_, mut members) in group_by_class(labels) {
        members.shuffle(&mut rng);
        for i in members {
            assignment[i] = next_fold;
            next_fold = (next_fold + 1) % k;
        }
    }

    let folds = (0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| assignment[i] == fold);
            (train, validation)
        })
        .filter(|(train, validation)| !train.is_empty() && !validation.is_empty())
        .collect();
    Ok(folds)
}
