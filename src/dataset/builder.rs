//! Dataset assembly from the catalog
//!
//! Each eligible track is an independent unit of work: resolve its audio
//! path, extract features, and report either an example or a skip reason.
//! Work runs on the rayon pool and the results are aggregated afterwards in
//! sample order, so the dataset composition does not depend on scheduling.

use super::{Dataset, LabeledExample, MIN_EXAMPLES_PER_GENRE};
use crate::discovery::{audio_path, Catalog};
use crate::error::{GenreError, Result};
use crate::features::{self, FeatureConfig};
use crate::types::TrackRecord;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Options controlling which tracks are used and how they are read
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Catalog subset a track must belong to
    pub subset: String,
    /// Tracks with an id at or above this value are ignored
    pub id_ceiling: u32,
    /// Sample at most this many eligible tracks
    pub max_tracks: Option<usize>,
    /// Seed for the sample drawn when `max_tracks` is set
    pub sample_seed: u64,
    /// Audio file extension in the sharded layout
    pub extension: String,
    pub min_examples_per_genre: usize,
    pub features: FeatureConfig,
    pub show_progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            subset: "large".to_string(),
            id_ceiling: 106_574,
            max_tracks: None,
            sample_seed: 42,
            extension: "mp3".to_string(),
            min_examples_per_genre: MIN_EXAMPLES_PER_GENRE,
            features: FeatureConfig::default(),
            show_progress: false,
        }
    }
}

/// A track that did not make it into the dataset
#[derive(Debug, Clone)]
pub struct SkippedTrack {
    pub track_id: u32,
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a dataset build
#[derive(Debug)]
pub struct DatasetBuild {
    pub dataset: Dataset,
    /// Genres that survived filtering, in the order first encountered.
    /// Diagnostic only; the label codec defines the class order.
    pub retained_labels: Vec<String>,
    pub skipped: Vec<SkippedTrack>,
    /// Number of tracks selected for extraction
    pub selected: usize,
}

enum TrackOutcome {
    Extracted(LabeledExample),
    Skipped(SkippedTrack),
}

/// Build a labeled dataset from `catalog` with audio under `root`
pub fn build(catalog: &Catalog, root: &Path, options: &BuildOptions) -> Result<DatasetBuild> {
    options.features.validate()?;
    if !root.is_dir() {
        return Err(GenreError::FileNotFound(root.to_path_buf()));
    }

    let selected = select_tracks(catalog, options);
    info!(
        "Extracting features for {} tracks from {}",
        selected.len(),
        root.display()
    );

    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new(selected.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let outcomes: Vec<TrackOutcome> = selected
        .par_iter()
        .map(|record| {
            let outcome = process_track(record, root, options);
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
                pb.set_message(format!("{:06}", record.track_id));
            }
            outcome
        })
        .collect();

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Feature extraction complete");
    }

    let mut dataset = Dataset::default();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            TrackOutcome::Extracted(example) => dataset.push(example),
            TrackOutcome::Skipped(track) => skipped.push(track),
        }
    }

    info!(
        "Extracted {} tracks, skipped {}",
        dataset.len(),
        skipped.len()
    );

    dataset.retain_min_examples(options.min_examples_per_genre);
    let retained_labels = dataset.labels_in_order();

    Ok(DatasetBuild {
        dataset,
        retained_labels,
        skipped,
        selected: selected.len(),
    })
}

/// Eligible records, optionally reduced to a seeded random sample
fn select_tracks<'a>(catalog: &'a Catalog, options: &BuildOptions) -> Vec<&'a TrackRecord> {
    let mut eligible = catalog.eligible(&options.subset, options.id_ceiling);
    debug!(
        "{} of {} catalog tracks are eligible (subset '{}', id < {})",
        eligible.len(),
        catalog.len(),
        options.subset,
        options.id_ceiling
    );

    if let Some(max) = options.max_tracks {
        if max < eligible.len() {
            let mut rng = StdRng::seed_from_u64(options.sample_seed);
            eligible.shuffle(&mut rng);
            eligible.truncate(max);
            debug!("Sampled {} tracks with seed {}", max, options.sample_seed);
        }
    }

    eligible
}

fn process_track(record: &TrackRecord, root: &Path, options: &BuildOptions) -> TrackOutcome {
    let path = audio_path(root, record.track_id, &options.extension);
    let skip = |reason: String| {
        TrackOutcome::Skipped(SkippedTrack {
            track_id: record.track_id,
            path: path.clone(),
            reason,
        })
    };

    let label = match record.genre.as_deref() {
        Some(label) => label,
        None => return skip("no genre label".to_string()),
    };

    if !path.is_file() {
        debug!("Missing audio for track {}: {}", record.track_id, path.display());
        return skip("audio file missing".to_string());
    }

    match features::extract(&path, &options.features) {
        Ok(feature) => {
            debug!("Extracted {} ({})", path.display(), label);
            TrackOutcome::Extracted(LabeledExample {
                track_id: record.track_id,
                feature,
                label: label.to_string(),
            })
        }
        Err(e) => {
            if e.is_recoverable() {
                warn!("Skipping {}: {}", path.display(), e);
            } else {
                error!("Failed {}: {}", path.display(), e);
            }
            skip(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(n: u32) -> Catalog {
        Catalog::from_records(
            (1..=n)
                .map(|id| TrackRecord::new(id, "large", Some(if id % 2 == 0 { "Rock" } else { "Jazz" })))
                .collect(),
        )
    }

    #[test]
    fn test_sample_is_deterministic_for_seed() {
        let catalog = catalog(50);
        let options = BuildOptions {
            max_tracks: Some(10),
            ..BuildOptions::default()
        };
        let a: Vec<u32> = select_tracks(&catalog, &options).iter().map(|r| r.track_id).collect();
        let b: Vec<u32> = select_tracks(&catalog, &options).iter().map(|r| r.track_id).collect();
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);

        let other = BuildOptions {
            sample_seed: 7,
            ..options
        };
        let c: Vec<u32> = select_tracks(&catalog, &other).iter().map(|r| r.track_id).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_max_tracks_above_eligible_keeps_all() {
        let catalog = catalog(5);
        let options = BuildOptions {
            max_tracks: Some(100),
            ..BuildOptions::default()
        };
        let ids: Vec<u32> = select_tracks(&catalog, &options).iter().map(|r| r.track_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_missing_files_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = build(&catalog(4), dir.path(), &BuildOptions::default()).unwrap();
        assert!(result.dataset.is_empty());
        assert_eq!(result.selected, 4);
        assert_eq!(result.skipped.len(), 4);
        assert!(result.skipped.iter().all(|s| s.reason.contains("missing")));
        assert_eq!(result.skipped[0].path, dir.path().join("000").join("000001.mp3"));
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let shard = dir.path().join("000");
        std::fs::create_dir(&shard).unwrap();
        std::fs::write(shard.join("000001.mp3"), b"not audio").unwrap();

        let result = build(&catalog(1), dir.path(), &BuildOptions::default()).unwrap();
        assert!(result.dataset.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].track_id, 1);
    }

    #[test]
    fn test_missing_root_is_error() {
        let err = build(&catalog(1), Path::new("/no/such/root"), &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, GenreError::FileNotFound(_)));
    }
}
