//! Mel filterbank and decibel conversion
//!
//! Uses the Slaney mel scale (linear below 1 kHz, logarithmic above) with
//! Slaney area normalization, so each triangular filter has unit area in Hz.

/// Below this frequency the Slaney scale is linear
const MIN_LOG_HZ: f64 = 1000.0;
/// Width of one mel in the linear region (Hz)
const F_SP: f64 = 200.0 / 3.0;
/// Mel value at `MIN_LOG_HZ`
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

/// Lower clamp applied to power before taking the logarithm
pub const AMIN: f32 = 1e-10;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Convert Hz to mels (Slaney scale)
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert mels to Hz (Slaney scale)
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filterbank, `[mel_bands][freq_bins]`
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    weights: Vec<Vec<f32>>,
}

impl MelFilterbank {
    /// Build a filterbank spanning 0 Hz to Nyquist
    pub fn new(sample_rate: u32, n_fft: usize, mel_bands: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let sr = sample_rate as f64;

        let fft_freqs: Vec<f64> = (0..bins).map(|j| j as f64 * sr / n_fft as f64).collect();

        // mel_bands + 2 edge frequencies evenly spaced on the mel scale
        let min_mel = hz_to_mel(0.0);
        let max_mel = hz_to_mel(sr / 2.0);
        let edges = mel_bands + 2;
        let mel_f: Vec<f64> = (0..edges)
            .map(|i| {
                let frac = if edges > 1 { i as f64 / (edges - 1) as f64 } else { 0.0 };
                mel_to_hz(min_mel + frac * (max_mel - min_mel))
            })
            .collect();

        let weights = (0..mel_bands)
            .map(|m| {
                let lower_width = mel_f[m + 1] - mel_f[m];
                let upper_width = mel_f[m + 2] - mel_f[m + 1];
                let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);

                fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - mel_f[m]) / lower_width;
                        let upper = (mel_f[m + 2] - f) / upper_width;
                        (lower.min(upper).max(0.0) * enorm) as f32
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn mel_bands(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[Vec<f32>] {
        &self.weights
    }

    /// Project power frames `[time][bins]` onto the mel scale, returning `[mel][time]`
    pub fn apply(&self, power_frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
        self.weights
            .iter()
            .map(|filter| {
                power_frames
                    .iter()
                    .map(|frame| filter.iter().zip(frame).map(|(w, p)| w * p).sum())
                    .collect()
            })
            .collect()
    }
}

/// Convert a power spectrogram to decibels relative to its own peak, in place
///
/// Values are clipped below at `peak_db - top_db`. Returns that floor, which
/// is the value a zero-power cell maps to after clipping.
pub fn power_to_db(spec: &mut [Vec<f32>], top_db: f32) -> f32 {
    let peak = spec
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(0.0f32, f32::max);
    let ref_db = 10.0 * peak.max(AMIN).log10();

    let mut max_db = f32::NEG_INFINITY;
    for value in spec.iter_mut().flat_map(|row| row.iter_mut()) {
        *value = 10.0 * value.max(AMIN).log10() - ref_db;
        max_db = max_db.max(*value);
    }

    if !max_db.is_finite() {
        // Nothing to convert: the floor is relative to a 0 dB peak
        return -top_db;
    }

    let floor = max_db - top_db;
    for value in spec.iter_mut().flat_map(|row| row.iter_mut()) {
        *value = value.max(floor);
    }
    floor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slaney_scale_reference_points() {
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
        assert!((hz_to_mel(200.0) - 3.0).abs() < 1e-9);
        assert!((mel_to_hz(15.0) - 1000.0).abs() < 1e-6);
        for hz in [0.0, 55.0, 440.0, 999.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_filterbank_has_no_empty_filters() {
        let bank = MelFilterbank::new(22050, 2048, 128);
        assert_eq!(bank.mel_bands(), 128);
        for (i, filter) in bank.weights().iter().enumerate() {
            assert_eq!(filter.len(), 1025);
            assert!(filter.iter().all(|&w| w >= 0.0));
            assert!(filter.iter().any(|&w| w > 0.0), "filter {} is empty", i);
        }
    }

    #[test]
    fn test_filter_centers_increase() {
        let bank = MelFilterbank::new(22050, 2048, 40);
        let centers: Vec<usize> = bank
            .weights()
            .iter()
            .map(|f| {
                f.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap()
            })
            .collect();
        assert!(centers.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_power_to_db_relative_to_peak() {
        let mut spec = vec![vec![1.0, 0.1], vec![0.01, 0.0]];
        let floor = power_to_db(&mut spec, 80.0);
        assert!((spec[0][0] - 0.0).abs() < 1e-5);
        assert!((spec[0][1] + 10.0).abs() < 1e-4);
        assert!((spec[1][0] + 20.0).abs() < 1e-4);
        // Zero power is clipped to the floor
        assert_eq!(floor, -80.0);
        assert_eq!(spec[1][1], -80.0);
    }

    #[test]
    fn test_power_to_db_silence_is_flat() {
        let mut spec = vec![vec![0.0; 4]; 3];
        power_to_db(&mut spec, 80.0);
        assert!(spec.iter().flatten().all(|&v| v == 0.0));
    }
}
