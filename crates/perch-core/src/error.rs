//! Core error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during the prediction pipeline
#[derive(Error, Debug)]
pub enum PerchError {
    #[error("Failed to read audio file: {path}")]
    AudioReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio too short for feature extraction")]
    AudioTooShort,

    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to load label table: {0}")]
    LabelTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PerchError>;
