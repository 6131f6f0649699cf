//! API handlers for variant resolution and combined downloads.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::warn;
use vidmux_core::pipeline::{PipelineError, PipelineJob};
use vidmux_core::resolver::{ResolvedMedia, SourceLocator};

use crate::server::AppState;

/// Liveness probe.
pub async fn health() -> &'static str {
    "vidmux: ok"
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    /// Source locator: a watch URL or bare video id
    pub url: String,
}

/// `GET /api/resolve?url=...` - title, thumbnail and partitioned variant lists.
pub async fn resolve_media(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolvedMedia>, ApiError> {
    let locator = SourceLocator::parse(&query.url).map_err(PipelineError::from)?;
    let media = state
        .provider
        .fetch(&locator)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(media))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Source locator: a watch URL or bare video id
    pub url: String,
    /// Chosen video-only variant id
    pub video: String,
    /// Chosen audio-only variant id
    pub audio: String,
}

/// `GET /api/download?url=...&video=...&audio=...` - runs the pipeline and
/// streams the muxed MP4 back as an attachment.
pub async fn download_media(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let job = PipelineJob::new(&state.scratch_dir, query.url, query.video, query.audio);
    let deliverable = state.orchestrator.run(job).await?;

    // The output is already unlinked; this handle is the last reference to
    // its bytes. A failed read (client gone) is logged, never re-raised:
    // the job already succeeded and nothing is left to clean up.
    let stream = ReaderStream::new(deliverable.file)
        .inspect_err(|e| warn!("Delivery interrupted mid-stream: {e}"));

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, deliverable.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", deliverable.filename),
        )
        .body(Body::from_stream(stream))
        .unwrap())
}

/// Pipeline error wrapper carrying the HTTP mapping.
#[derive(Debug)]
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else {
            match self.0.code() {
                "upstream_fetch_error" | "download_error" => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };

        let body = Json(json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use vidmux_core::resolver::ResolveError;

    use super::*;

    fn status_of(error: PipelineError) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_of(PipelineError::Resolve(ResolveError::InvalidLocator {
                input: "bad-url".to_string()
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PipelineError::Resolve(ResolveError::UpstreamFetch {
                reason: "video unavailable".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(PipelineError::Download {
                variant_id: "137".to_string(),
                reason: "connection reset".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(PipelineError::Mux {
                reason: "exit code 1".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
