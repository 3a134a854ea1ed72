//! MFCC feature extraction
//!
//! Computes the 40-coefficient MFCC summary vector the classifier was
//! trained on, matching librosa's defaults:
//! - Resample to 22 050 Hz mono
//! - Centered STFT, frame_size=2048, hop_size=512, periodic Hann window
//! - 128-band Slaney mel filterbank, Slaney area normalization
//! - Power to dB (amin=1e-10, top_db=80)
//! - Orthonormal DCT-II, first 40 coefficients
//! - Mean over all frames

use realfft::RealFftPlanner;

use crate::audio::resample_linear;
use crate::error::{PerchError, Result};

/// Sample rate the features (and model) are defined at
pub const TARGET_SAMPLE_RATE: u32 = 22_050;

/// Number of MFCC coefficients in the feature vector
pub const N_MFCC: usize = 40;

/// Number of mel filterbank bands
const N_MELS: usize = 128;

/// STFT frame size in samples
const FRAME_SIZE: usize = 2048;

/// STFT hop size in samples
const HOP_SIZE: usize = 512;

/// Number of spectrum bins per frame (FRAME_SIZE / 2 + 1)
const N_BINS: usize = FRAME_SIZE / 2 + 1;

/// Floor for power values before taking the log
const AMIN: f32 = 1e-10;

/// Dynamic range clamp below the spectrogram peak, in dB
const TOP_DB: f32 = 80.0;

/// Compute the fixed-size MFCC feature vector for a clip.
///
/// `samples` is mono audio at `sample_rate`; it is resampled to
/// [`TARGET_SAMPLE_RATE`] internally. Fails on empty input or clips too
/// short to fill the reflection padding.
pub fn compute_mfcc(samples: &[f32], sample_rate: u32) -> Result<[f32; N_MFCC]> {
    if samples.is_empty() {
        return Err(PerchError::AudioTooShort);
    }

    let resampled = if sample_rate == TARGET_SAMPLE_RATE {
        samples.to_vec()
    } else {
        resample_linear(samples, sample_rate as f32, TARGET_SAMPLE_RATE as f32)
    };

    // Reflection padding needs more than FRAME_SIZE/2 samples
    if resampled.len() <= FRAME_SIZE / 2 {
        return Err(PerchError::AudioTooShort);
    }

    // Centered STFT: pad FRAME_SIZE/2 on both sides by reflection
    let padded = reflect_pad(&resampled, FRAME_SIZE / 2);
    let n_frames = (padded.len() - FRAME_SIZE) / HOP_SIZE + 1;

    let window = hann_window(FRAME_SIZE);
    let filterbank = mel_filterbank(N_MELS, TARGET_SAMPLE_RATE as f32);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let mut fft_in = fft.make_input_vec();
    let mut fft_out = fft.make_output_vec();

    // Mel power spectrogram, [n_frames][N_MELS]
    let mut mel_frames = Vec::with_capacity(n_frames);
    let mut power = [0.0f32; N_BINS];

    for frame_idx in 0..n_frames {
        let start = frame_idx * HOP_SIZE;
        for (i, out) in fft_in.iter_mut().enumerate() {
            *out = padded[start + i] * window[i];
        }

        fft.process(&mut fft_in, &mut fft_out)
            .map_err(|e| PerchError::FeatureExtraction(e.to_string()))?;

        for (p, c) in power.iter_mut().zip(fft_out.iter()) {
            *p = c.norm_sqr();
        }

        let mut mel = vec![0.0f32; N_MELS];
        for (band, filter) in filterbank.iter().enumerate() {
            let mut energy = 0.0f32;
            for (&coeff, &spec_val) in filter.iter().zip(power.iter()) {
                energy += coeff * spec_val;
            }
            mel[band] = energy;
        }
        mel_frames.push(mel);
    }

    power_to_db(&mut mel_frames);

    // DCT-II over the mel axis, keep the first N_MFCC coefficients,
    // then average across frames
    let dct = dct_basis(N_MFCC, N_MELS);
    let mut mean = [0.0f32; N_MFCC];
    for mel in &mel_frames {
        for (k, row) in dct.iter().enumerate() {
            let mut acc = 0.0f32;
            for (&b, &m) in row.iter().zip(mel.iter()) {
                acc += b * m;
            }
            mean[k] += acc;
        }
    }
    for v in &mut mean {
        *v /= mel_frames.len() as f32;
    }

    Ok(mean)
}

/// Pad a signal by reflecting `pad` samples around each edge
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let n = samples.len();
    let mut padded = Vec::with_capacity(n + 2 * pad);
    for i in (1..=pad).rev() {
        padded.push(samples[i]);
    }
    padded.extend_from_slice(samples);
    for i in 2..=(pad + 1) {
        padded.push(samples[n - i]);
    }
    padded
}

/// Generate a periodic Hann window of given size
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Convert a mel power spectrogram to dB in place
///
/// 10*log10 with an amin floor, then clamp everything to TOP_DB below the
/// global peak (librosa's power_to_db).
fn power_to_db(frames: &mut [Vec<f32>]) {
    let mut peak = f32::MIN;
    for frame in frames.iter_mut() {
        for v in frame.iter_mut() {
            *v = 10.0 * v.max(AMIN).log10();
            peak = peak.max(*v);
        }
    }
    let floor = peak - TOP_DB;
    for frame in frames.iter_mut() {
        for v in frame.iter_mut() {
            *v = v.max(floor);
        }
    }
}

/// Slaney-style mel scale: linear below 1 kHz, logarithmic above
fn hz_to_mel(freq: f32) -> f32 {
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = 15.0;
    // Precomputed: ln(6.4)/27
    const LOGSTEP: f32 = 0.068_751_78;

    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / LOGSTEP
    } else {
        3.0 * freq / 200.0
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = 15.0;
    const LOGSTEP: f32 = 0.068_751_78;

    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOGSTEP * (mel - MIN_LOG_MEL)).exp()
    } else {
        200.0 * mel / 3.0
    }
}

/// Create the mel filterbank matrix
///
/// Returns `n_bands` triangular filters with N_BINS coefficients each,
/// normalized so each filter integrates to roughly constant area
/// (Slaney normalization).
fn mel_filterbank(n_bands: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let f_max = sample_rate / 2.0;

    // Band edge frequencies: n_bands + 2 points evenly spaced in mel
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(f_max);
    let edges: Vec<f32> = (0..n_bands + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_bands + 1) as f32))
        .collect();

    let fft_freqs: Vec<f32> = (0..N_BINS)
        .map(|k| k as f32 * sample_rate / FRAME_SIZE as f32)
        .collect();

    let mut filterbank = Vec::with_capacity(n_bands);
    for band in 0..n_bands {
        let (left, center, right) = (edges[band], edges[band + 1], edges[band + 2]);
        let enorm = 2.0 / (right - left);

        let filter: Vec<f32> = fft_freqs
            .iter()
            .map(|&freq| {
                let up = (freq - left) / (center - left).max(f32::EPSILON);
                let down = (right - freq) / (right - center).max(f32::EPSILON);
                up.min(down).max(0.0) * enorm
            })
            .collect();
        filterbank.push(filter);
    }

    filterbank
}

/// Orthonormal DCT-II basis, `n_out` rows over `n_in` inputs
fn dct_basis(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let mut basis = Vec::with_capacity(n_out);
    for k in 0..n_out {
        let scale = if k == 0 {
            (1.0 / n_in as f32).sqrt()
        } else {
            (2.0 / n_in as f32).sqrt()
        };
        let row: Vec<f32> = (0..n_in)
            .map(|n| {
                let angle =
                    std::f32::consts::PI * k as f32 * (2.0 * n as f32 + 1.0) / (2.0 * n_in as f32);
                scale * angle.cos()
            })
            .collect();
        basis.push(row);
    }
    basis
}
