//! Tempo estimation using stratum-dsp

use super::traits::TempoEstimator;
use crate::error::{GenreError, Result};
use crate::types::AudioBuffer;
use stratum_dsp::{analyze_audio, AnalysisConfig};
use tracing::debug;

/// Sample rate stratum-dsp's frame and hop defaults are tuned for
const STRATUM_SAMPLE_RATE: u32 = 44100;

/// Tempo estimator backed by stratum-dsp's onset and tempogram analysis
#[derive(Debug, Default, Clone, Copy)]
pub struct StratumTempoEstimator;

impl StratumTempoEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl TempoEstimator for StratumTempoEstimator {
    fn estimate(&self, buffer: &AudioBuffer) -> Result<f64> {
        debug!(
            "Estimating tempo with stratum-dsp ({} samples, {}Hz)",
            buffer.len(),
            buffer.sample_rate
        );

        let result = analyze_audio(&buffer.samples, buffer.sample_rate, AnalysisConfig::default())
            .map_err(|e| GenreError::InferenceError(format!("tempo estimation failed: {}", e)))?;

        // Two decimals, as reported to users
        let bpm = (result.bpm as f64 * 100.0).round() / 100.0;
        debug!("Estimated tempo {:.2} BPM (confidence {:.2})", bpm, result.bpm_confidence);
        Ok(bpm)
    }

    fn sample_rate(&self) -> u32 {
        STRATUM_SAMPLE_RATE
    }

    fn name(&self) -> &'static str {
        "stratum-dsp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decaying 5 ms clicks on every beat
    fn click_track(bpm: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
        let total = (duration_secs * sample_rate as f32) as usize;
        let per_beat = (60.0 / bpm * sample_rate as f32) as usize;
        let click = (0.005 * sample_rate as f32) as usize;
        let samples = (0..total)
            .map(|i| {
                let pos = i % per_beat;
                if pos < click {
                    0.8 * (-5.0 * pos as f32 / click as f32).exp()
                } else {
                    0.0
                }
            })
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_click_track_tempo_in_range() {
        let bpm = StratumTempoEstimator::new()
            .estimate(&click_track(120.0, 10.0, STRATUM_SAMPLE_RATE))
            .unwrap();
        assert!((60.0..=240.0).contains(&bpm), "estimated {} BPM", bpm);
    }

    #[test]
    fn test_empty_buffer_is_error() {
        let empty = AudioBuffer::new(Vec::new(), STRATUM_SAMPLE_RATE);
        assert!(StratumTempoEstimator::new().estimate(&empty).is_err());
    }

    #[test]
    fn test_name_and_rate() {
        let estimator = StratumTempoEstimator::default();
        assert_eq!(estimator.name(), "stratum-dsp");
        assert_eq!(estimator.sample_rate(), 44100);
    }
}
