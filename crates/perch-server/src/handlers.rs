//! API request handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use perch_core::{audio, features, BirdClassifier, LabelTable};

use crate::types::{ErrorResponse, PredictionResponse, StatusResponse};

/// Shared application state
///
/// Built once in `main` and shared read-only across all requests. The ort
/// session inside the classifier carries its own lock.
pub struct AppState {
    pub classifier: BirdClassifier,
    pub labels: LabelTable,
    pub temp_dir: PathBuf,
}

/// Scratch file for one upload, removed when the guard drops
///
/// The file is named after the client-supplied filename, so concurrent
/// uploads with identical names collide (retained source behavior, see
/// DESIGN.md).
struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    fn write(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename);
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove temp file {:?}: {}", self.path, e);
            }
        }
    }
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn server_error(message: String) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}

/// GET /api/status - liveness probe, no model invocation
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = StatusResponse {
        status: "ready".to_string(),
        labels: state.labels.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (StatusCode::OK, Json(response))
}

/// POST /api/predict - identify the bird species in an uploaded clip
///
/// Expects a multipart body with an audio file in the `file` field.
/// Responses: 200 with prediction + confidence, 400 when no file is
/// attached, 500 when any step of the pipeline fails.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let (filename, bytes) = match extract_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    log::info!("Predict request: {:?} ({} bytes)", filename, bytes.len());

    let temp = match TempUpload::write(&state.temp_dir, &filename, &bytes) {
        Ok(temp) => temp,
        Err(e) => return server_error(format!("Failed to store upload: {}", e)),
    };

    let result = run_prediction(&state, temp.path());
    // `temp` is dropped past this point on every path, removing the file

    match result {
        Ok(response) => {
            log::info!(
                "Prediction: {} ({:.2}%)",
                response.prediction,
                response.confidence
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            log::warn!("Prediction failed for {:?}: {}", filename, e);
            server_error(e.to_string())
        }
    }
}

/// Pull the `file` field out of a multipart body.
///
/// An absent field, an empty upload, and an unreadable body all map to the
/// 400 response the caller returns as-is.
async fn extract_upload(
    mut multipart: Multipart,
) -> std::result::Result<(String, Vec<u8>), axum::response::Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(&format!("Malformed multipart body: {}", e))),
        };

        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            return match field.bytes().await {
                Ok(bytes) if bytes.is_empty() => Err(bad_request("No file provided")),
                Ok(bytes) => Ok((filename, bytes.to_vec())),
                Err(e) => Err(bad_request(&format!("Failed to read upload: {}", e))),
            };
        }
    }

    Err(bad_request("No file provided"))
}

/// The synchronous pipeline: decode, extract features, classify, label
fn run_prediction(state: &AppState, path: &Path) -> perch_core::Result<PredictionResponse> {
    let samples = audio::load_mono(path, features::TARGET_SAMPLE_RATE)?;
    let mfcc = features::compute_mfcc(&samples, features::TARGET_SAMPLE_RATE)?;
    let (index, probability) = state.classifier.predict(&mfcc)?;

    Ok(PredictionResponse {
        prediction: state.labels.get(index).to_string(),
        confidence: round2(probability as f64 * 100.0),
    })
}

/// Round to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::extract::FromRequest;
    use axum::http::Request;
    use perch_core::PerchError;

    const BOUNDARY: &str = "perch-test-boundary";

    fn form_body(field: &str, filename: &str, payload: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\r\n{payload}\r\n--{b}--\r\n",
            b = BOUNDARY
        )
    }

    async fn multipart_from(body: String) -> Multipart {
        let request = Request::builder()
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    async fn error_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_extract_upload_returns_file_field() {
        let multipart = multipart_from(form_body("file", "clip.wav", "RIFFdata")).await;
        let (filename, bytes) = extract_upload(multipart).await.unwrap();
        assert_eq!(filename, "clip.wav");
        assert_eq!(bytes, b"RIFFdata");
    }

    #[tokio::test]
    async fn test_extract_upload_missing_field_is_400() {
        // A multipart body whose only field is not named `file`
        let multipart = multipart_from(form_body("audio", "clip.wav", "RIFFdata")).await;
        let response = extract_upload(multipart).await.unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_body(response).await["error"], "No file provided");
    }

    #[tokio::test]
    async fn test_extract_upload_empty_body_is_400() {
        let multipart = multipart_from(format!("--{}--\r\n", BOUNDARY)).await;
        let response = extract_upload(multipart).await.unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extract_upload_empty_bytes_is_400() {
        let multipart = multipart_from(form_body("file", "clip.wav", "")).await;
        let response = extract_upload(multipart).await.unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_body(response).await["error"], "No file provided");
    }

    #[tokio::test]
    async fn test_processing_error_maps_to_500_with_error_key() {
        // Every pipeline failure reaches the client as this response shape
        let err = PerchError::UnsupportedFormat("not audio".to_string());
        let response = server_error(err.to_string());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = error_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Unsupported audio format"));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(97.42199), 97.42);
        assert_eq!(round2(0.005), 0.01);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn test_temp_upload_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let temp = TempUpload::write(dir.path(), "clip.wav", b"abc").unwrap();
            path = temp.path().to_path_buf();
            assert!(path.exists());
            assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_upload_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("scratch");
        let temp = TempUpload::write(&nested, "clip.wav", b"abc").unwrap();
        assert!(temp.path().exists());
    }

    #[test]
    fn test_temp_upload_drop_tolerates_external_removal() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempUpload::write(dir.path(), "clip.wav", b"abc").unwrap();
        std::fs::remove_file(temp.path()).unwrap();
        // Drop must not panic when the file is already gone
    }
}
