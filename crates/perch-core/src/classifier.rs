//! ONNX-based bird species classification
//!
//! Loads the pre-trained classifier once and runs single-clip inference on
//! 40-coefficient MFCC vectors. `ort::Session::run` takes `&mut self`, so
//! the session sits behind a `Mutex` and the classifier itself can be shared
//! read-only (e.g. in an `Arc` held by every request handler).

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array3;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{PerchError, Result};
use crate::features::N_MFCC;

/// Pre-loaded classification model
///
/// The model takes a `[1, 40, 1]` f32 tensor and produces a softmax
/// distribution over species classes.
#[derive(Debug)]
pub struct BirdClassifier {
    session: Mutex<Session>,
    input_name: String,
}

impl BirdClassifier {
    /// Load the ONNX model from disk.
    ///
    /// Called once at startup; inference reuses the session for every request.
    pub fn load(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(PerchError::ModelLoad(format!(
                "Model not found: {}",
                model_path.display()
            )));
        }

        log::info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(1)?))
            .and_then(|mut b| b.commit_from_file(model_path))
            .map_err(|e| PerchError::ModelLoad(e.to_string()))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| PerchError::ModelLoad("Model has no inputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Run inference on one feature vector.
    ///
    /// Returns the winning class index and its probability. The model's
    /// final layer is softmax; the raw maximum is reported without
    /// re-normalization.
    pub fn predict(&self, features: &[f32; N_MFCC]) -> Result<(usize, f32)> {
        // Model input shape: [batch=1, coefficients=40, channels=1]
        let input = Array3::from_shape_vec((1, N_MFCC, 1), features.to_vec())
            .map_err(|e| PerchError::Inference(format!("Input shape error: {}", e)))?;

        let input_tensor = Tensor::from_array(input)
            .map_err(|e| PerchError::Inference(format!("Tensor creation error: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PerchError::Inference("Model session poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| PerchError::Inference(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| PerchError::Inference("Model produced no output".to_string()))?;

        let (_shape, probs) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| PerchError::Inference(format!("Output extraction error: {}", e)))?;

        top1(probs).ok_or_else(|| PerchError::Inference("Empty model output".to_string()))
    }
}

/// Index and value of the largest probability
fn top1(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top1_picks_maximum() {
        let probs = [0.1, 0.05, 0.7, 0.15];
        assert_eq!(top1(&probs), Some((2, 0.7)));
    }

    #[test]
    fn test_top1_first_wins_on_tie() {
        let probs = [0.5, 0.5];
        assert_eq!(top1(&probs), Some((0, 0.5)));
    }

    #[test]
    fn test_top1_empty() {
        assert_eq!(top1(&[]), None);
    }

    #[test]
    fn test_load_missing_model_fails() {
        let err = BirdClassifier::load(Path::new("/nonexistent/model.onnx")).unwrap_err();
        assert!(matches!(err, PerchError::ModelLoad(_)));
    }
}
