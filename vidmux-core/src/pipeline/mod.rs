//! Download-and-combine pipeline.
//!
//! A [`PipelineJob`] is the unit of work for one request: resolve the
//! locator, stream the two chosen variants into scratch files concurrently,
//! mux them into one MP4, and hand the result back for delivery. Scratch
//! files are namespaced by a per-job UUID so concurrent jobs never collide,
//! and every exit path erases them.

pub mod mux;
pub mod orchestrator;

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

pub use mux::{FfmpegMuxer, Muxer};
pub use orchestrator::{Deliverable, PipelineOrchestrator};

use crate::resolver::ResolveError;

/// Errors that can terminate a pipeline job.
///
/// Validation and variant-lookup failures are caller errors; everything
/// else is a server-side failure. None of these are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("variant {variant_id} is not a {role} variant of this resource")]
    UnknownVariant {
        /// Identifier the caller supplied
        variant_id: String,
        /// Role the variant was supposed to fill
        role: VariantRole,
    },

    #[error("download failed for variant {variant_id}: {reason}")]
    Download { variant_id: String, reason: String },

    #[error("mux failed: {reason}")]
    Mux { reason: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable machine-readable code for the API error payload.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Resolve(ResolveError::InvalidLocator { .. }) => "invalid_locator",
            PipelineError::Resolve(ResolveError::UpstreamFetch { .. }) => "upstream_fetch_error",
            PipelineError::UnknownVariant { .. } => "unknown_variant",
            PipelineError::Download { .. } => "download_error",
            PipelineError::Mux { .. } => "mux_error",
            PipelineError::Io(_) => "io_error",
        }
    }

    /// Checks if this error is due to caller input rather than a fault of
    /// the service or its upstreams.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Resolve(ResolveError::InvalidLocator { .. })
                | PipelineError::UnknownVariant { .. }
        )
    }
}

/// Which slot of the job a chosen variant fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantRole {
    VideoOnly,
    AudioOnly,
}

impl fmt::Display for VariantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantRole::VideoOnly => f.write_str("video-only"),
            VariantRole::AudioOnly => f.write_str("audio-only"),
        }
    }
}

/// The unit of work for one download-and-combine request.
///
/// Holds the raw locator (validated when the orchestrator runs), the two
/// chosen variant ids, and the three scratch paths derived from a freshly
/// generated job id.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub locator: String,
    pub video_variant_id: String,
    pub audio_variant_id: String,
    job_id: Uuid,
    video_path: PathBuf,
    audio_path: PathBuf,
    output_path: PathBuf,
}

impl PipelineJob {
    /// Creates a job with a unique id and scratch paths under `scratch_dir`.
    pub fn new(
        scratch_dir: &Path,
        locator: impl Into<String>,
        video_variant_id: impl Into<String>,
        audio_variant_id: impl Into<String>,
    ) -> Self {
        let job_id = Uuid::new_v4();
        Self {
            locator: locator.into(),
            video_variant_id: video_variant_id.into(),
            audio_variant_id: audio_variant_id.into(),
            job_id,
            video_path: scratch_dir.join(format!("{job_id}.video.part")),
            audio_path: scratch_dir.join(format!("{job_id}.audio.part")),
            output_path: scratch_dir.join(format!("{job_id}.out.mp4")),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Erases all three scratch files.
    ///
    /// Idempotent: missing files are a no-op, and any other removal error
    /// is logged and swallowed. Cleanup must never fail a job that has
    /// already reached its terminal outcome.
    pub async fn cleanup(&self) {
        for path in [&self.video_path, &self.audio_path, &self.output_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {e}", path.display()),
            }
        }
    }
}

/// Removes a job's scratch files synchronously; used by the drop guard
/// when a job future is cancelled mid-flight.
pub(crate) fn cleanup_blocking(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove scratch file {}: {e}", path.display()),
        }
    }
}

/// Creates the process-wide scratch directory.
///
/// Runs once at startup, not in the request path, so concurrent first
/// requests never race directory creation. Safe to call repeatedly.
pub async fn init_scratch_dir(directory: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(directory).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths_are_namespaced_and_distinct() {
        let scratch = Path::new("/tmp/scratch");
        let a = PipelineJob::new(scratch, "dQw4w9WgXcQ", "137", "140");
        let b = PipelineJob::new(scratch, "dQw4w9WgXcQ", "137", "140");

        assert_ne!(a.job_id(), b.job_id());
        assert_ne!(a.video_path(), b.video_path());
        assert_ne!(a.output_path(), b.output_path());

        let id = a.job_id().to_string();
        assert!(a.video_path().to_string_lossy().contains(&id));
        assert!(a.audio_path().to_string_lossy().contains(&id));
        assert!(a.output_path().to_string_lossy().ends_with(".out.mp4"));
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let job = PipelineJob::new(dir.path(), "dQw4w9WgXcQ", "137", "140");

        tokio::fs::write(job.video_path(), b"v").await.unwrap();
        tokio::fs::write(job.output_path(), b"o").await.unwrap();

        job.cleanup().await;
        assert!(!job.video_path().exists());
        assert!(!job.audio_path().exists());
        assert!(!job.output_path().exists());

        // Second pass over already-absent files must be a no-op.
        job.cleanup().await;
    }

    #[tokio::test]
    async fn test_init_scratch_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("nested").join("scratch");
        init_scratch_dir(&scratch).await.unwrap();
        init_scratch_dir(&scratch).await.unwrap();
        assert!(scratch.is_dir());
    }

    #[test]
    fn test_error_codes_and_caller_classification() {
        let invalid = PipelineError::Resolve(ResolveError::InvalidLocator {
            input: "bad-url".to_string(),
        });
        assert_eq!(invalid.code(), "invalid_locator");
        assert!(invalid.is_caller_error());

        let unknown = PipelineError::UnknownVariant {
            variant_id: "999".to_string(),
            role: VariantRole::AudioOnly,
        };
        assert_eq!(unknown.code(), "unknown_variant");
        assert!(unknown.is_caller_error());
        assert!(unknown.to_string().contains("audio-only"));

        let mux = PipelineError::Mux {
            reason: "exit code 1".to_string(),
        };
        assert_eq!(mux.code(), "mux_error");
        assert!(!mux.is_caller_error());
    }
}
