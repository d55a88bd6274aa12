//! Audio decoding using symphonia
//!
//! Produces mono f32 samples at a requested rate. Decoding can be capped at a
//! duration so that per-file cost stays bounded regardless of input length.

use crate::error::{ErrorContext, GenreError, Result};
use crate::types::AudioBuffer;
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Files above 2 GB are refused before decoding
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Source audio read past the requested duration, consumed by resampling
const DURATION_MARGIN_SECS: f64 = 0.5;

/// Rate assumed when a container does not report one
const FALLBACK_SOURCE_RATE: u32 = 44100;

const RESAMPLE_CHUNK: usize = 1024;

/// An opened container positioned at its first audio track
struct SourceTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
}

/// Decode an audio file to a mono AudioBuffer at `target_rate`
///
/// With `max_duration` set, reading stops shortly after that much audio.
/// The result can be slightly longer than `max_duration`; callers needing
/// an exact length trim it themselves.
pub fn decode(path: &Path, target_rate: u32, max_duration: Option<f64>) -> Result<AudioBuffer> {
    if target_rate == 0 {
        return Err(GenreError::ConfigError("target sample rate must be positive".to_string()));
    }

    let mut source = open_track(path)?;
    let limit = max_duration
        .map(|secs| ((secs + DURATION_MARGIN_SECS) * source.sample_rate as f64).ceil() as usize);

    let mono = read_mono(&mut source, limit, path)?;
    let samples = resample(&mono, source.sample_rate, target_rate);

    debug!(
        "Decoded {}: {} samples @ {}Hz ({:.2}s)",
        path.display(),
        samples.len(),
        target_rate,
        samples.len() as f64 / target_rate as f64
    );
    Ok(AudioBuffer::new(samples, target_rate))
}

fn open_track(path: &Path) -> Result<SourceTrack> {
    let size = std::fs::metadata(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GenreError::FileNotFound(path.to_path_buf()),
            _ => GenreError::decode_error(path, format!("Failed to read file metadata: {}", e)),
        })?
        .len();
    if size > MAX_FILE_SIZE {
        return Err(GenreError::decode_error(
            path,
            format!("File too large ({:.1} GB), the limit is 2 GB", size as f64 / 1e9),
        ));
    }

    let file = std::fs::File::open(path).with_file_context(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| GenreError::decode_error(path, format!("Failed to probe format: {}", e)))?
        .format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| GenreError::decode_error(path, "No audio tracks found"))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(FALLBACK_SOURCE_RATE);

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| GenreError::decode_error(path, format!("Failed to create decoder: {}", e)))?;

    trace!("Opened {} (track {}, {}Hz)", path.display(), track_id, sample_rate);
    Ok(SourceTrack {
        format,
        decoder,
        track_id,
        sample_rate,
    })
}

/// Read packets until end of stream or `limit` mono samples
fn read_mono(source: &mut SourceTrack, limit: Option<usize>, path: &Path) -> Result<Vec<f32>> {
    let mut mono: Vec<f32> = Vec::new();

    while limit.map_or(true, |max| mono.len() < max) {
        let packet = match source.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(GenreError::decode_error(path, format!("Failed to read packet: {}", e))),
        };
        if packet.track_id() != source.track_id {
            continue;
        }

        let decoded = match source.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(GenreError::decode_error(path, format!("Decode error: {}", e))),
        };

        // Channel count per packet, not per track: some containers only
        // report it once decoding starts
        let spec = *decoded.spec();
        let mut interleaved = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        downmix_into(&mut mono, interleaved.samples(), spec.channels.count());
    }

    if let Some(max) = limit {
        mono.truncate(max);
    }
    Ok(mono)
}

/// Append the per-frame channel mean of interleaved `samples`
fn downmix_into(out: &mut Vec<f32>, samples: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(samples);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Band-limited resampling of mono audio
///
/// Output length is `len * to / from`, rounded, with the resampler's delay
/// removed. Feature extraction for training and for inference both go
/// through here.
pub(crate) fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    match resample_fft(samples, from_rate, to_rate, expected) {
        Ok(output) => output,
        Err(e) => {
            debug!("FFT resampling {}Hz -> {}Hz failed ({}), interpolating", from_rate, to_rate, e);
            interpolate_linear(samples, expected)
        }
    }
}

fn resample_fft(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
    expected: usize,
) -> std::result::Result<Vec<f32>, Box<dyn std::error::Error>> {
    let mut resampler = FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1)?;
    let delay = resampler.output_delay();
    let chunk_len = resampler.input_frames_next();

    let mut output = Vec::with_capacity(expected + delay + resampler.output_frames_max());
    for chunk in samples.chunks(chunk_len) {
        let block = if chunk.len() == chunk_len {
            resampler.process(&[chunk], None)?
        } else {
            resampler.process_partial(Some(&[chunk]), None)?
        };
        output.extend_from_slice(&block[0]);
    }

    // Flush the filter tail
    while output.len() < expected + delay {
        let block = resampler.process_partial(None::<&[&[f32]]>, None)?;
        if block[0].is_empty() {
            break;
        }
        output.extend_from_slice(&block[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

/// Linear interpolation onto `len` evenly spaced points
fn interpolate_linear(samples: &[f32], len: usize) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let step = samples.len() as f64 / len.max(1) as f64;
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(samples.len() - 1);
            let next = samples[(idx + 1).min(samples.len() - 1)];
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (next - samples[idx]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let mut mono = vec![1.0];
        downmix_into(&mut mono, &[0.5, 0.3, 0.8, 0.2, 1.0, 0.0], 2);
        assert_eq!(mono.len(), 4);
        assert!((mono[1] - 0.4).abs() < 1e-6);
        assert!((mono[2] - 0.5).abs() < 1e-6);
        assert!((mono[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mut mono = Vec::new();
        downmix_into(&mut mono, &[0.5, 0.8, 1.0], 1);
        assert_eq!(mono, vec![0.5, 0.8, 1.0]);
    }

    #[test]
    fn test_resample_identity_and_empty() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(resample(&samples, 22050, 22050), samples);
        assert!(resample(&[], 44100, 22050).is_empty());
    }

    #[test]
    fn test_resample_length_matches_ratio() {
        let samples: Vec<f32> = (0..4410).map(|i| i as f32 / 4410.0).collect();
        assert_eq!(resample(&samples, 44100, 22050).len(), 2205);
        assert_eq!(resample(&samples[..1000], 22050, 44100).len(), 2000);
    }

    #[test]
    fn test_resample_keeps_sine_amplitude() {
        use std::f32::consts::PI;
        let samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();

        let result = resample(&samples, 44100, 22050);
        let peak = result.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        assert!(peak > 0.9, "peak {} should be > 0.9", peak);
    }

    #[test]
    fn test_interpolate_linear() {
        let result = interpolate_linear(&[0.0, 1.0, 2.0, 3.0], 8);
        assert_eq!(result.len(), 8);
        assert!((result[1] - 0.5).abs() < 1e-6);
        assert!(interpolate_linear(&[], 4).is_empty());
    }

    #[test]
    fn test_decode_missing_file_is_file_not_found() {
        let err = decode(Path::new("/definitely/not/here.mp3"), 22050, None).unwrap_err();
        assert!(matches!(err, GenreError::FileNotFound(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"this is not audio at all").unwrap();
        let err = decode(&path, 22050, Some(30.0)).unwrap_err();
        assert!(matches!(err, GenreError::DecodeError { .. }));
    }

    #[test]
    fn test_decode_wav_with_duration_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..(22050 * 3) {
            let v = ((i as f32 * 0.05).sin() * 10000.0) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let capped = decode(&path, 22050, Some(1.0)).unwrap();
        assert_eq!(capped.sample_rate, 22050);
        assert_eq!(capped.len(), (1.5f64 * 22050.0).ceil() as usize);

        let full = decode(&path, 22050, None).unwrap();
        assert_eq!(full.len(), 22050 * 3);
    }
}
