//! Perch server - bird species identification over HTTP
//!
//! Startup sequence:
//! 1. Load configuration (optional path as the first CLI argument)
//! 2. Load the label table and the ONNX classifier, once for the process
//! 3. Serve `POST /api/predict` and `GET /api/status` until shutdown

mod handlers;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use perch_core::config::{default_config_path, load_config};
use perch_core::{BirdClassifier, LabelTable};

use handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("perch-server starting up");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    let labels = LabelTable::load(&config.model.labels_path)
        .with_context(|| format!("Loading label table {:?}", config.model.labels_path))?;
    let classifier = BirdClassifier::load(&config.model.model_path)
        .with_context(|| format!("Loading model {:?}", config.model.model_path))?;

    // The label key set is expected to match the model's output width; that
    // cannot be checked here, so at least make both visible at startup.
    log::info!(
        "Model loaded from {:?}, label table has {} species",
        config.model.model_path,
        labels.len()
    );

    std::fs::create_dir_all(&config.storage.temp_dir)
        .with_context(|| format!("Creating temp dir {:?}", config.storage.temp_dir))?;

    let state = Arc::new(AppState {
        classifier,
        labels,
        temp_dir: config.storage.temp_dir.clone(),
    });

    // CORS: permissive, the service is meant to sit behind a browser client
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/predict", post(handlers::predict))
        // Audio uploads exceed axum's 2 MB default body limit
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    log::info!("Perch API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Binding {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
