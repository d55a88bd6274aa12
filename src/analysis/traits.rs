//! Collaborator trait abstractions
//!
//! The composite report combines the local genre classifier with external
//! services. Each service sits behind one of these traits so a caller can
//! plug in a network client, a library binding, or a test double. Tempo
//! has a bundled implementation in [`super::tempo`].

use crate::error::Result;
use crate::types::{AudioBuffer, TrackIdentity};
use std::path::Path;

/// Audio fingerprinting (identifies title and artist)
pub trait TrackRecognizer: Send + Sync {
    /// Identify the recording in `path`; `Ok(None)` when it is not recognized
    fn recognize(&self, path: &Path) -> Result<Option<TrackIdentity>>;

    /// Get the name of this recognizer (for logging)
    fn name(&self) -> &'static str;
}

/// Community tag lookup for a known track
pub trait TagSource: Send + Sync {
    /// Most popular tags first
    fn top_tags(&self, artist: &str, title: &str) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// Tempo estimation
pub trait TempoEstimator: Send + Sync {
    /// Estimate tempo in beats per minute
    fn estimate(&self, buffer: &AudioBuffer) -> Result<f64>;

    /// Rate the audio is decoded at before `estimate`
    fn sample_rate(&self) -> u32 {
        22050
    }

    fn name(&self) -> &'static str;
}

/// General-purpose audio event tagging (instruments, sound classes)
pub trait InstrumentTagger: Send + Sync {
    /// The `n` highest scoring class names, best first
    fn top_classes(&self, path: &Path, n: usize) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}
