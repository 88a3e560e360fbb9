//! Shared fixtures for moodlens-ai integration tests
#![allow(dead_code)]

use moodlens_ai::classifier::training::train_with_candidates;
use moodlens_ai::classifier::{EstimatorKind, ModelArtifact};
use moodlens_ai::dataset::{read_raw_frame_from_reader, LabeledDataset};
use moodlens_ai::normalizer::{normalize_frame, NormalizedFrame};
use moodlens_common::config::{SplitPolicy, TomlConfig, TrainingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

/// Raw label, [tempo, energy, valence, danceability] centre, lyric
pub const CLASSES: [(&str, [f64; 4], &str); 4] = [
    ("joy", [120.0, 0.60, 0.90, 0.70], "I love this beautiful happy day"),
    ("love", [90.0, 0.30, 0.60, 0.40], "calm waters"),
    ("sadness", [70.0, 0.15, 0.10, 0.25], "I cry alone in pain and sorrow"),
    ("anger", [150.0, 0.95, 0.50, 0.90], "Party all night, dance with me, so much fun"),
];

pub const HEADER: &str = "track_name,artists,Tempo,Energy,Valence,Danceability,lyrics,emotion";

/// Well-separated synthetic dataset, `per_class` rows per mood
pub fn synthetic_csv(per_class: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..per_class {
        for (c, (label, centre, lyric)) in CLASSES.iter().enumerate() {
            let tempo = centre[0] + rng.gen_range(-5.0..5.0);
            let energy = centre[1] + rng.gen_range(-0.04..0.04);
            let valence = centre[2] + rng.gen_range(-0.04..0.04);
            let dance = centre[3] + rng.gen_range(-0.04..0.04);
            csv.push_str(&format!(
                "Song {c}-{i},Artist {c},{tempo:.2},{energy:.3},{valence:.3},{dance:.3},\"{lyric}\",{label}\n"
            ));
        }
    }
    csv
}

pub fn frame_from_csv(csv: &str) -> NormalizedFrame {
    normalize_frame(&read_raw_frame_from_reader(csv.as_bytes()).unwrap())
}

/// Small, fast training settings
pub fn quick_training() -> TrainingConfig {
    TrainingConfig {
        max_per_class: 0,
        seed: 7,
        cv_folds: 3,
        split: SplitPolicy::TrainValidationTest,
        forest_trees: 15,
        knn_neighbors: 3,
    }
}

pub fn train(csv: &str, candidates: &[EstimatorKind]) -> ModelArtifact {
    let dataset = LabeledDataset::from_frame(&frame_from_csv(csv)).unwrap();
    train_with_candidates(&dataset, &quick_training(), candidates).unwrap()
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Config whose data and model paths live under `dir`
pub fn config_in(dir: &Path) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.paths.data_dir = dir.to_path_buf();
    config.paths.model_path = dir.join("mood_model.json");
    config.training = quick_training();
    config
}
