//! Audio decoding for uploaded clips
//!
//! Decodes any Symphonia-supported container/codec to f32 samples, mixes
//! down to mono, and resamples to the feature extraction rate. The result
//! is the same signal shape the classifier was trained on.

use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PerchError, Result};

/// Decode an audio file to interleaved f32 samples using Symphonia
///
/// Returns (samples, sample_rate, channels).
pub fn decode_audio(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    let file = std::fs::File::open(path).map_err(|e| PerchError::AudioReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    // Probe the media source
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PerchError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PerchError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PerchError::UnsupportedFormat("Unknown sample rate".to_string()))?;

    let channels = channel_count(track.codec_params.channels.map(|c| c.count()))?;

    // Create decoder
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PerchError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    // Decode all packets
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet: {}", e);
                continue;
            }
        };

        // Initialize sample buffer on first decode
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(PerchError::UnsupportedFormat(
            "No decodable audio data".to_string(),
        ));
    }

    Ok((samples, sample_rate, channels))
}

/// Validate the channel count reported by the codec parameters.
///
/// Guessing a layout here would silently mis-mix the signal, so a track
/// that does not declare its channels is rejected instead.
fn channel_count(reported: Option<usize>) -> Result<u16> {
    match reported {
        Some(n) if n >= 1 => Ok(n as u16),
        Some(_) => Err(PerchError::UnsupportedFormat(
            "Zero channel count".to_string(),
        )),
        None => Err(PerchError::UnsupportedFormat(
            "Unknown channel count".to_string(),
        )),
    }
}

/// Decode a file straight to mono samples at the requested rate
pub fn load_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let (samples, sample_rate, channels) = decode_audio(path)?;
    let mono = mixdown_mono(&samples, channels);
    if sample_rate == target_rate {
        Ok(mono)
    } else {
        Ok(resample_linear(&mono, sample_rate as f32, target_rate as f32))
    }
}

/// Average interleaved channels into a mono signal
pub fn mixdown_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// Simple linear interpolation resampling
pub fn resample_linear(samples: &[f32], from_sr: f32, to_sr: f32) -> Vec<f32> {
    let ratio = from_sr / to_sr;
    let output_len = (samples.len() as f32 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f32 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixdown_stereo_averages_channels() {
        let interleaved = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = mixdown_mono(&interleaved, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_mixdown_mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(mixdown_mono(&samples, 1), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..441).map(|i| i as f32 / 441.0).collect();
        let output = resample_linear(&input, 44100.0, 22050.0);
        assert_eq!(output.len(), 220);
    }

    #[test]
    fn test_resample_preserves_range() {
        let input: Vec<f32> = vec![0.0, 0.5, 1.0, 0.5, 0.0];
        let output = resample_linear(&input, 48000.0, 22050.0);
        for sample in &output {
            assert!(*sample >= 0.0 && *sample <= 1.0);
        }
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        // Write a short 22.05kHz mono WAV with hound, decode it back
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..22050 {
            let t = i as f32 / 22050.0;
            let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, sample_rate, channels) = decode_audio(&path).unwrap();
        assert_eq!(sample_rate, 22050);
        assert_eq!(channels, 1);
        assert_eq!(samples.len(), 22050);
        // Peak should be close to the written amplitude
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01, "peak {}", peak);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, [0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert!(decode_audio(&path).is_err());
    }

    #[test]
    fn test_channel_count_accepts_declared_layouts() {
        assert_eq!(channel_count(Some(1)).unwrap(), 1);
        assert_eq!(channel_count(Some(2)).unwrap(), 2);
    }

    #[test]
    fn test_channel_count_rejects_undeclared() {
        assert!(matches!(
            channel_count(None).unwrap_err(),
            PerchError::UnsupportedFormat(_)
        ));
        assert!(matches!(
            channel_count(Some(0)).unwrap_err(),
            PerchError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let err = decode_audio(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, PerchError::AudioReadError { .. }));
    }
}
