//! Core data types for genrekit
//!
//! These types represent the domain model and flow through the pipeline.

use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// One row of the metadata catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Primary key of the catalog, also determines the audio file location
    pub track_id: u32,
    /// Subset membership (e.g. "small", "medium", "large")
    pub subset: String,
    /// Top-level genre label, absent for untagged tracks
    pub genre: Option<String>,
}

impl TrackRecord {
    pub fn new(track_id: u32, subset: impl Into<String>, genre: Option<&str>) -> Self {
        Self {
            track_id,
            subset: subset.into(),
            genre: genre.map(str::to_string),
        }
    }
}

// =============================================================================
// Predictions
// =============================================================================

/// Top genre prediction for one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenrePrediction {
    /// Decoded genre label
    pub genre: String,
    /// Probability assigned to `genre` (0.0 - 1.0)
    pub confidence: f32,
}

/// Track identity reported by a fingerprinting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackIdentity {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_id: Option<String>,
}

// =============================================================================
// Audio
// =============================================================================

/// Mono samples at a known rate, as produced by the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds; zero for a buffer without a valid rate
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Container formats accepted as prediction input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aiff,
    Ogg,
}

impl AudioFormat {
    /// Format for a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_ascii_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "wav" | "wave" => AudioFormat::Wav,
            "flac" => AudioFormat::Flac,
            "aiff" | "aif" => AudioFormat::Aiff,
            "ogg" | "oga" => AudioFormat::Ogg,
            _ => return None,
        };
        Some(format)
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_buffer_duration() {
        assert!((AudioBuffer::new(vec![0.0; 44100], 22050).duration_secs() - 2.0).abs() < 1e-9);
        assert_eq!(AudioBuffer::new(vec![0.0; 10], 0).duration_secs(), 0.0);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_path(Path::new("/a/b/000002.aif")), Some(AudioFormat::Aiff));
        assert_eq!(AudioFormat::from_path(Path::new("/a/b/tracks.csv")), None);
        assert_eq!(AudioFormat::from_path(Path::new("/a/b/README")), None);
    }
}
