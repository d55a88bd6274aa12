//! STFT (Short-Time Fourier Transform) power spectrogram
//!
//! Frames are centered: the signal is zero-padded by `n_fft / 2` on both
//! sides so frame `t` is centered on sample `t * hop_length`. This gives
//! `1 + len / hop_length` frames for a signal of `len` samples.
//!
//! # Parameter choices
//!
//! - **n_fft = 2048**: ~93ms windows at 22.05kHz, 1025 frequency bins.
//! - **hop_length = 512**: 75% overlap, ~43 frames per second.
//! - **Periodic Hann window**: the DFT-even variant, so overlapped windows
//!   sum to a constant.

use rustfft::{num_complex::Complex, FftPlanner};

/// Number of frequency bins in the positive-frequency half of the spectrum
pub fn num_freq_bins(n_fft: usize) -> usize {
    n_fft / 2 + 1
}

/// Number of centered frames produced for a signal of `num_samples`
pub fn num_frames(num_samples: usize, n_fft: usize, hop_length: usize) -> usize {
    let padded = padded_len(num_samples, n_fft);
    (padded - n_fft) / hop_length + 1
}

fn padded_len(num_samples: usize, n_fft: usize) -> usize {
    (num_samples + 2 * (n_fft / 2)).max(n_fft)
}

/// Compute the power spectrogram `|X|²` of a mono signal
///
/// Returns `[time_frames][freq_bins]`.
pub fn power_spectrogram(samples: &[f32], n_fft: usize, hop_length: usize) -> Vec<Vec<f32>> {
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; padded_len(samples.len(), n_fft)];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);
    let bins = num_freq_bins(n_fft);

    let frames = num_frames(samples.len(), n_fft, hop_length);
    let mut spectrogram = Vec::with_capacity(frames);
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); n_fft];

    for frame_idx in 0..frames {
        let start = frame_idx * hop_length;
        let frame = &padded[start..start + n_fft];

        for ((slot, &sample), &w) in buffer.iter_mut().zip(frame).zip(&window) {
            *slot = Complex::new(sample * w, 0.0);
        }

        fft.process(&mut buffer);

        spectrogram.push(buffer[..bins].iter().map(|c| c.norm_sqr()).collect());
    }

    spectrogram
}

/// Generate a periodic Hann window of given size
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}
