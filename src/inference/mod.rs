//! Genre prediction from audio files using a persisted artifact

pub mod classifier;
pub mod service;

pub use classifier::GenreClassifier;
pub use service::{GenreResponse, GenreService, ServiceError};
