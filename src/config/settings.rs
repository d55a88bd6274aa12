//! Runtime configuration settings

use super::cli::{PredictArgs, TrainArgs};
use crate::dataset::BuildOptions;
use crate::features::FeatureConfig;
use crate::model::TrainingConfig;
use std::path::PathBuf;

/// Default worker count: leave one core for the main thread
pub fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Runtime settings for a training run
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub catalog: PathBuf,
    pub audio_root: PathBuf,
    /// Artifact directory
    pub output: PathBuf,
    pub build: BuildOptions,
    pub training: TrainingConfig,
    /// Number of feature extraction worker threads
    pub threads: usize,
}

impl TrainSettings {
    pub fn from_args(args: &TrainArgs, threads: Option<usize>, show_progress: bool) -> Self {
        let build = BuildOptions {
            subset: args.subset.clone(),
            id_ceiling: args.id_ceiling,
            max_tracks: args.max_tracks,
            sample_seed: args.seed,
            extension: args.extension.clone(),
            show_progress,
            ..BuildOptions::default()
        };
        let training = TrainingConfig::new()
            .with_epochs(args.epochs)
            .with_batch_size(args.batch_size)
            .with_seed(args.seed);

        Self {
            catalog: args.catalog.clone(),
            audio_root: args.audio_root.clone(),
            output: args.output.clone(),
            build,
            training,
            threads: threads.unwrap_or_else(default_threads),
        }
    }

    /// Feature parameters used for both the dataset and the saved artifact
    pub fn features(&self) -> &FeatureConfig {
        &self.build.features
    }
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("tracks.csv"),
            audio_root: PathBuf::from("."),
            output: PathBuf::from("./models/genre"),
            build: BuildOptions::default(),
            training: TrainingConfig::new(),
            threads: default_threads(),
        }
    }
}

/// Runtime settings for analyzing audio files
#[derive(Debug, Clone)]
pub struct PredictSettings {
    /// Input path (file or directory)
    pub input: PathBuf,
    /// Artifact directory; located automatically when `None`
    pub model: Option<PathBuf>,
    /// Report file; stdout when `None`
    pub output: Option<PathBuf>,
    pub recursive: bool,
    pub threads: usize,
    pub show_progress: bool,
}

impl PredictSettings {
    pub fn from_args(args: &PredictArgs, threads: Option<usize>, show_progress: bool) -> Self {
        Self {
            input: args.input.clone(),
            model: args.model.clone(),
            output: args.output.clone(),
            recursive: args.recursive,
            threads: threads.unwrap_or_else(default_threads),
            show_progress,
        }
    }
}

impl Default for PredictSettings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            model: None,
            output: None,
            recursive: true,
            threads: default_threads(),
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::{Cli, Command};
    use clap::Parser;

    #[test]
    fn test_train_settings_share_the_seed() {
        let cli = Cli::parse_from([
            "genrekit", "-q", "train", "--catalog", "t.csv", "--audio-root", "a", "--output", "m",
            "--seed", "7", "--max-tracks", "100", "--extension", "wav",
        ]);
        let Command::Train(args) = &cli.command else {
            panic!("expected train");
        };
        let settings = TrainSettings::from_args(args, Some(2), !cli.quiet);
        assert_eq!(settings.build.sample_seed, 7);
        assert_eq!(settings.training.seed, 7);
        assert_eq!(settings.build.max_tracks, Some(100));
        assert_eq!(settings.build.extension, "wav");
        assert!(!settings.build.show_progress);
        assert_eq!(settings.threads, 2);
    }

    #[test]
    fn test_default_threads_at_least_one() {
        assert!(default_threads() >= 1);
        assert!(PredictSettings::default().threads >= 1);
    }
}
