//! CLI argument parsing and configuration

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// genrekit - Music genre classification from audio
///
/// Trains a convolutional genre classifier on a catalog of labeled tracks
/// and analyzes audio files with the trained model.
#[derive(Parser, Debug)]
#[command(name = "genrekit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long, default_value = "false", global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a dataset from a catalog and train a genre model
    Train(TrainArgs),
    /// Analyze audio files with a trained model
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Track catalog CSV (track_id, subset and top-level genre per track)
    #[arg(long, value_name = "CSV")]
    pub catalog: PathBuf,

    /// Root of the audio tree (<root>/<first 3 digits>/<6-digit id>.<ext>)
    #[arg(long, value_name = "DIR")]
    pub audio_root: PathBuf,

    /// Directory to write the model artifact to
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Randomly sample at most N eligible tracks
    #[arg(long, value_name = "N")]
    pub max_tracks: Option<usize>,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Seed for sampling, splitting, shuffling and weight init
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Audio file extension in the audio tree
    #[arg(long, default_value = "mp3")]
    pub extension: String,

    /// Catalog subset to train on
    #[arg(long, default_value = "large")]
    pub subset: String,

    /// Only track ids below this value are used
    #[arg(long, default_value_t = 106574)]
    pub id_ceiling: u32,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Audio file or directory to analyze
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Model artifact directory (searched for when omitted)
    #[arg(short, long, value_name = "DIR")]
    pub model: Option<PathBuf>,

    /// Write the JSON reports to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Scan subdirectories recursively
    #[arg(short, long, default_value = "true")]
    pub recursive: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
