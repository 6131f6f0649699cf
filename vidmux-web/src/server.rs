//! HTTP server wiring for Vidmux.
//!
//! Builds the shared state from configuration, registers the two API
//! routes plus a liveness probe, and applies the CORS policy. The
//! Content-Disposition header is exposed so cross-origin callers can read
//! the suggested download filename.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::header;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use vidmux_core::config::VidmuxConfig;
use vidmux_core::pipeline::{FfmpegMuxer, Muxer, PipelineOrchestrator, init_scratch_dir};
use vidmux_core::resolver::{MetadataProvider, YtDlpProvider};

use crate::handlers::{download_media, health, resolve_media};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn MetadataProvider>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub scratch_dir: PathBuf,
}

impl AppState {
    pub fn new(
        config: &VidmuxConfig,
        provider: Arc<dyn MetadataProvider>,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        Self {
            provider: provider.clone(),
            orchestrator: Arc::new(PipelineOrchestrator::new(config, provider, muxer)),
            scratch_dir: config.scratch.directory.clone(),
        }
    }
}

/// Builds the API router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/resolve", get(resolve_media))
        .route("/api/download", get(download_media))
        .layer(
            CorsLayer::permissive().expose_headers([header::CONTENT_DISPOSITION]),
        )
        .with_state(state)
}

/// Creates production components, the scratch directory, and serves the
/// API until the process exits.
pub async fn run_server(config: VidmuxConfig) -> Result<(), Box<dyn std::error::Error>> {
    let muxer = Arc::new(FfmpegMuxer::new(&config.mux));
    if !muxer.is_available() {
        tracing::warn!(
            "{} not runnable; download requests will fail at the mux stage",
            config.mux.ffmpeg_binary.display()
        );
    }

    let provider = Arc::new(YtDlpProvider::new(&config.fetch));

    // Scratch directory creation happens once here, never per request.
    init_scratch_dir(&config.scratch.directory).await?;

    let state = AppState::new(&config, provider, muxer);
    let app = router(state);

    tracing::info!("Vidmux API listening on http://{}", config.server.bind_address);
    let listener = tokio::net::TcpListener::bind(config.server.bind_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
