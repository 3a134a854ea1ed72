//! Perch core library — bird species identification from audio.
//!
//! The pipeline is linear: decode an audio file to mono samples, compute a
//! fixed 40-coefficient MFCC summary, run the pre-trained ONNX classifier,
//! and map the winning class index to a species name.
//!
//! - **Decoding** (`audio.rs`): Symphonia-based decode + mono mixdown + resample
//! - **Features** (`features.rs`): Pure Rust MFCC (realfft STFT + mel filterbank + DCT)
//! - **Inference** (`classifier.rs`): ort session, loaded once per process
//! - **Labels** (`labels.rs`): static index → species table with "Unknown" fallback

pub mod audio;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod labels;

pub use classifier::BirdClassifier;
pub use error::{PerchError, Result};
pub use labels::LabelTable;
