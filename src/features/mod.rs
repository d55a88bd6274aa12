//! Audio feature extraction
//!
//! Converts audio into a fixed-shape log-mel spectrogram:
//!
//! 1. Decode to mono at `sample_rate` (resampling if the source differs)
//! 2. Truncate or zero-pad to exactly `sample_rate * duration_secs` samples
//! 3. Centered STFT power spectrogram
//! 4. Slaney mel filterbank with `mel_bands` filters
//! 5. Decibels relative to the clip's own peak, floored at `peak - top_db`
//! 6. Keep the first `time_frames` columns, padding short ones with the floor
//!
//! The same [`FeatureConfig`] must be used for training and inference. It is
//! stored in the model artifact, and the inference path reads it from there.

pub mod mel;
pub mod stft;

use crate::audio;
use crate::audio::decoder::resample;
use crate::error::{GenreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::trace;

pub use mel::MelFilterbank;

/// Feature extraction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Analysis sample rate in Hz
    pub sample_rate: u32,
    /// Clip length in seconds; longer audio is truncated, shorter is zero-padded
    pub duration_secs: f64,
    /// Number of mel frequency bands (rows)
    pub mel_bands: usize,
    /// Number of time frames kept (columns)
    pub time_frames: usize,
    /// FFT window size
    pub n_fft: usize,
    /// Hop between STFT frames
    pub hop_length: usize,
    /// Dynamic range kept below the clip's peak, in dB
    pub top_db: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            duration_secs: 30.0,
            mel_bands: 128,
            time_frames: 128,
            n_fft: 2048,
            hop_length: 512,
            top_db: 80.0,
        }
    }
}

impl FeatureConfig {
    /// Exact number of samples a clip is forced to before the STFT
    pub fn target_samples(&self) -> usize {
        (self.sample_rate as f64 * self.duration_secs).round() as usize
    }

    /// Shape of one feature as seen by the model: `[mel_bands, time_frames, 1]`
    pub fn input_shape(&self) -> [usize; 3] {
        [self.mel_bands, self.time_frames, 1]
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.sample_rate == 0 {
            Some("sample_rate must be positive")
        } else if !(self.duration_secs.is_finite() && self.duration_secs >= 0.0) {
            Some("duration_secs must be a non-negative number")
        } else if self.mel_bands == 0 || self.time_frames == 0 {
            Some("mel_bands and time_frames must be positive")
        } else if self.n_fft < 2 || self.hop_length == 0 {
            Some("n_fft must be at least 2 and hop_length positive")
        } else if !(self.top_db.is_finite() && self.top_db > 0.0) {
            Some("top_db must be positive")
        } else {
            None
        };

        match problem {
            Some(reason) => Err(GenreError::ConfigError(format!("feature config: {}", reason))),
            None => Ok(()),
        }
    }
}

/// Log-mel spectrogram of fixed shape `(mel_bands, time_frames)`, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFeature {
    mel_bands: usize,
    time_frames: usize,
    data: Vec<f32>,
}

impl SpectralFeature {
    /// Wrap row-major data; fails if the length does not match the shape
    pub fn from_vec(mel_bands: usize, time_frames: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != mel_bands * time_frames {
            return Err(GenreError::ConfigError(format!(
                "feature data has {} values, expected {}x{}",
                data.len(),
                mel_bands,
                time_frames
            )));
        }
        Ok(Self {
            mel_bands,
            time_frames,
            data,
        })
    }

    /// `(mel_bands, time_frames)`
    pub fn shape(&self) -> (usize, usize) {
        (self.mel_bands, self.time_frames)
    }

    pub fn get(&self, mel: usize, frame: usize) -> f32 {
        self.data[mel * self.time_frames + frame]
    }

    /// Values in row-major order. Identical memory layout to the
    /// `(mel_bands, time_frames, 1)` single-channel view the model consumes.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Shape with the trailing singleton channel dimension appended
    pub fn channel_shape(&self) -> [usize; 3] {
        [self.mel_bands, self.time_frames, 1]
    }
}

/// Decode an audio file and extract its spectral feature
pub fn extract(path: &Path, config: &FeatureConfig) -> Result<SpectralFeature> {
    config.validate()?;
    let buffer = audio::decode(path, config.sample_rate, Some(config.duration_secs))?;
    extract_from_samples(&buffer.samples, buffer.sample_rate, config)
}

/// Extract a spectral feature from already-decoded mono samples
///
/// Samples at a different rate than `config.sample_rate` are resampled first.
/// Empty input is valid and yields a full-shape feature.
pub fn extract_from_samples(
    samples: &[f32],
    sample_rate: u32,
    config: &FeatureConfig,
) -> Result<SpectralFeature> {
    config.validate()?;

    let resampled;
    let samples = if sample_rate != config.sample_rate && sample_rate > 0 {
        resampled = resample(samples, sample_rate, config.sample_rate);
        &resampled[..]
    } else {
        samples
    };

    let clip = fix_length(samples, config.target_samples());

    let power = stft::power_spectrogram(&clip, config.n_fft, config.hop_length);
    let filterbank = MelFilterbank::new(config.sample_rate, config.n_fft, config.mel_bands);
    let mut mel_spec = filterbank.apply(&power);
    let floor = mel::power_to_db(&mut mel_spec, config.top_db);

    let computed_frames = power.len();
    trace!(
        "Mel spectrogram: {} bands x {} frames (keeping {})",
        config.mel_bands,
        computed_frames,
        config.time_frames
    );

    let mut data = Vec::with_capacity(config.mel_bands * config.time_frames);
    for row in &mel_spec {
        let kept = computed_frames.min(config.time_frames);
        data.extend_from_slice(&row[..kept]);
        data.extend(std::iter::repeat(floor).take(config.time_frames - kept));
    }

    SpectralFeature::from_vec(config.mel_bands, config.time_frames, data)
}

/// Truncate or zero-pad to exactly `len` samples
fn fix_length(samples: &[f32], len: usize) -> Vec<f32> {
    let mut clip = samples[..samples.len().min(len)].to_vec();
    clip.resize(len, 0.0);
    clip
}
