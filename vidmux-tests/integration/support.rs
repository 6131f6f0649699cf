//! Shared fixtures: a local variant server, a canned metadata provider and
//! muxer stand-ins that keep the pipeline contract testable without ffmpeg.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use vidmux_core::config::VidmuxConfig;
use vidmux_core::pipeline::{Muxer, PipelineError};
use vidmux_core::resolver::{
    MetadataProvider, ResolveError, ResolvedMedia, SourceLocator, VariantDescriptor,
};

pub const VIDEO_BYTES: &[u8] = b"video-elementary-stream";
pub const AUDIO_BYTES: &[u8] = b"audio-elementary-stream";

/// Serves variant bytes on an ephemeral local port.
///
/// `/video` and `/audio` succeed; `/broken` answers 500 so one transfer leg
/// can be made to fail deterministically.
pub async fn spawn_variant_server() -> SocketAddr {
    let app = Router::new()
        .route("/video", get(|| async { VIDEO_BYTES }))
        .route("/audio", get(|| async { AUDIO_BYTES }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture listener");
    let addr = listener.local_addr().expect("fixture local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    addr
}

fn variant(id: &str, has_video: bool, has_audio: bool, fetch_locator: String) -> VariantDescriptor {
    VariantDescriptor {
        variant_id: id.to_string(),
        has_video,
        has_audio,
        quality_label: if has_video { "1080p" } else { "medium" }.to_string(),
        container: "mp4".to_string(),
        codec: if has_video { "avc1" } else { "mp4a" }.to_string(),
        bitrate_kbps: if has_video { None } else { Some(128.0) },
        fetch_locator,
    }
}

/// Variant list for a fixture resource: one video-only, one audio-only and
/// one combined variant, with fetch locators pointing at the local server.
pub fn canned_media(title: &str, server: SocketAddr, audio_route: &str) -> ResolvedMedia {
    let base = format!("http://{server}");
    let combined = variant("22", true, true, format!("{base}/video"));
    ResolvedMedia {
        title: title.to_string(),
        thumbnail: Some(format!("{base}/thumb.jpg")),
        author: Some("fixture".to_string()),
        duration_secs: Some(12.0),
        video_variants: vec![
            variant("137", true, false, format!("{base}/video")),
            combined.clone(),
        ],
        audio_variants: vec![
            variant("140", false, true, format!("{base}{audio_route}")),
            combined,
        ],
    }
}

/// Metadata provider returning a fixed payload and counting invocations, so
/// tests can assert resolution did or did not happen.
pub struct CannedProvider {
    media: ResolvedMedia,
    calls: AtomicUsize,
}

impl CannedProvider {
    pub fn new(media: ResolvedMedia) -> Self {
        Self {
            media,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for CannedProvider {
    async fn fetch(&self, _locator: &SourceLocator) -> Result<ResolvedMedia, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.media.clone())
    }
}

/// Muxer stand-in that concatenates both inputs, preserving the video bytes
/// verbatim at the front of the output.
pub struct ConcatMuxer;

#[async_trait]
impl Muxer for ConcatMuxer {
    async fn combine(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<(), PipelineError> {
        let mut combined = tokio::fs::read(video_path).await?;
        combined.extend(tokio::fs::read(audio_path).await?);
        tokio::fs::write(output_path, combined).await?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Muxer stand-in that always fails, for exercising the mux error path.
pub struct FailingMuxer;

#[async_trait]
impl Muxer for FailingMuxer {
    async fn combine(
        &self,
        _video_path: &Path,
        _audio_path: &Path,
        _output_path: &Path,
    ) -> Result<(), PipelineError> {
        Err(PipelineError::Mux {
            reason: "fixture muxer always fails".to_string(),
        })
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Config pointing the scratch directory at a test-owned location.
pub fn test_config(scratch_dir: &Path) -> VidmuxConfig {
    let mut config = VidmuxConfig::default();
    config.scratch.directory = scratch_dir.to_path_buf();
    config
}

/// Number of entries currently in the scratch directory.
pub fn scratch_entries(scratch_dir: &Path) -> usize {
    std::fs::read_dir(scratch_dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

pub fn arc_provider(media: ResolvedMedia) -> Arc<CannedProvider> {
    Arc::new(CannedProvider::new(media))
}
