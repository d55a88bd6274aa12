//! genrekit - Music genre classification from audio
//!
//! Trains a convolutional network on fixed-size log-mel spectrograms of
//! labeled tracks and serves predictions for new audio files.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: Catalog parsing and audio file scanning
//! - `audio`: Audio decoding using symphonia
//! - `features`: Log-mel spectrogram extraction
//! - `dataset`: Parallel dataset building from a catalog
//! - `model`: Label codec, CNN, training and artifact persistence
//! - `inference`: Load-once classifier behind a non-panicking service
//! - `analysis`: Composite reports with pluggable collaborators
//! - `pipeline`: Train and predict orchestration
//! - `export`: JSON report output
//!
//! # Example
//!
//! ```no_run
//! use genrekit::inference::GenreService;
//! use std::path::Path;
//!
//! let service = GenreService::new("./models/genre");
//! let response = service.predict_genre(Path::new("song.mp3"));
//! println!("{}", serde_json::to_string(&response).unwrap());
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod export;
pub mod features;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod types;

// Re-export key types at crate root
pub use error::{ErrorKind, GenreError, Result};
pub use features::{FeatureConfig, SpectralFeature};
pub use inference::{GenreResponse, GenreService};
pub use types::{AudioBuffer, GenrePrediction, TrackIdentity, TrackRecord};
