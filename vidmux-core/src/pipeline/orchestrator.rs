//! Pipeline orchestrator: the per-job state machine.
//!
//! One run walks Validating -> Resolving -> Downloading -> Muxing and hands
//! a [`Deliverable`] back for the Delivering step; any failure absorbs the
//! job into its terminal error after cleanup. The two variant downloads run
//! concurrently and are joined symmetrically: the first failure cancels its
//! sibling and neither leaves a scratch file behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{Muxer, PipelineError, PipelineJob, VariantRole, cleanup_blocking};
use crate::config::VidmuxConfig;
use crate::resolver::{MetadataProvider, SourceLocator, VariantDescriptor, sanitize_title};

/// A completed job ready for delivery.
///
/// The output was unlinked along with the rest of the job's scratch files
/// before this value is handed out; the open handle keeps its bytes
/// readable until delivery finishes, after which nothing remains on disk.
#[derive(Debug)]
pub struct Deliverable {
    /// Suggested attachment filename, sanitized title plus `.mp4`
    pub filename: String,
    /// Open handle on the muxed output
    pub file: File,
    /// Output size in bytes, for the Content-Length header
    pub size: u64,
}

/// Drives download-and-combine jobs. One orchestrator serves the whole
/// process; jobs are isolated by their scratch-path namespace.
pub struct PipelineOrchestrator {
    provider: Arc<dyn MetadataProvider>,
    muxer: Arc<dyn Muxer>,
    http: reqwest::Client,
}

impl PipelineOrchestrator {
    pub fn new(
        config: &VidmuxConfig,
        provider: Arc<dyn MetadataProvider>,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        Self {
            provider,
            muxer,
            http: reqwest::Client::builder()
                .user_agent(config.fetch.user_agent)
                .connect_timeout(config.fetch.connect_timeout)
                .redirect(reqwest::redirect::Policy::limited(3))
                .build()
                .expect("HTTP client creation should not fail"),
        }
    }

    /// Runs one job to its terminal state.
    ///
    /// On success the job's scratch files are already erased and the muxed
    /// output is returned as a [`Deliverable`]. On failure the error is
    /// returned after the same cleanup. Cancelling the returned future at
    /// any await point also erases the scratch files.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Resolve` - Invalid locator or upstream fetch failure
    /// - `PipelineError::UnknownVariant` - A chosen id is absent from the
    ///   fresh variant list or fills the wrong role
    /// - `PipelineError::Download` - Either transfer failed
    /// - `PipelineError::Mux` - External combine process failed
    pub async fn run(&self, job: PipelineJob) -> Result<Deliverable, PipelineError> {
        let guard = ScratchGuard::new(&job);

        let result = self.execute(&job).await;
        job.cleanup().await;
        guard.disarm();

        match result {
            Ok(deliverable) => {
                info!(
                    "Job {} complete: {} ({} bytes)",
                    job.job_id(),
                    deliverable.filename,
                    deliverable.size
                );
                Ok(deliverable)
            }
            Err(e) => {
                info!("Job {} failed: {e}", job.job_id());
                Err(e)
            }
        }
    }

    /// Validating through Muxing; cleanup is owned by `run`.
    async fn execute(&self, job: &PipelineJob) -> Result<Deliverable, PipelineError> {
        // Validating: no provider or disk work for a malformed locator.
        let locator = SourceLocator::parse(&job.locator)?;

        // Resolving: variant ids are not stable across resolutions, so the
        // fresh list is authoritative and also supplies fresh fetch locators.
        let media = self.provider.fetch(&locator).await?;

        let video = media
            .video_only_variant(&job.video_variant_id)
            .ok_or_else(|| PipelineError::UnknownVariant {
                variant_id: job.video_variant_id.clone(),
                role: VariantRole::VideoOnly,
            })?;
        let audio = media
            .audio_only_variant(&job.audio_variant_id)
            .ok_or_else(|| PipelineError::UnknownVariant {
                variant_id: job.audio_variant_id.clone(),
                role: VariantRole::AudioOnly,
            })?;

        info!(
            "Job {}: downloading {} ({}) + {} ({}) for \"{}\"",
            job.job_id(),
            video.variant_id,
            video.quality_label,
            audio.variant_id,
            audio.quality_label,
            media.title
        );

        // Downloading: both transfers in flight at once; the join is the
        // two-way barrier, and try_join drops the surviving transfer as
        // soon as its sibling errors.
        let (video_bytes, audio_bytes) = tokio::try_join!(
            self.download_variant(video, job.video_path()),
            self.download_variant(audio, job.audio_path()),
        )?;
        debug!(
            "Job {}: transfers complete ({video_bytes} + {audio_bytes} bytes)",
            job.job_id()
        );

        // Muxing.
        self.muxer
            .combine(job.video_path(), job.audio_path(), job.output_path())
            .await?;

        let file = File::open(job.output_path()).await?;
        let size = file.metadata().await?.len();

        Ok(Deliverable {
            filename: format!("{}.mp4", sanitize_title(&media.title, locator.video_id())),
            file,
            size,
        })
    }

    /// Streams one variant into its scratch file, returning the byte count.
    async fn download_variant(
        &self,
        variant: &VariantDescriptor,
        dest: &Path,
    ) -> Result<u64, PipelineError> {
        let download_error = |reason: String| PipelineError::Download {
            variant_id: variant.variant_id.clone(),
            reason,
        };

        let response = self
            .http
            .get(&variant.fetch_locator)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("upstream returned {status}")));
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            "Variant {} downloaded: {written} bytes -> {}",
            variant.variant_id,
            dest.display()
        );
        Ok(written)
    }
}

/// Erases a job's scratch files if its future is dropped before reaching a
/// terminal state (cancellation, layered timeout, handler panic).
struct ScratchGuard {
    paths: Option<[PathBuf; 3]>,
}

impl ScratchGuard {
    fn new(job: &PipelineJob) -> Self {
        Self {
            paths: Some([
                job.video_path().to_path_buf(),
                job.audio_path().to_path_buf(),
                job.output_path().to_path_buf(),
            ]),
        }
    }

    /// Terminal cleanup already ran; the guard has nothing left to do.
    fn disarm(mut self) {
        self.paths = None;
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Some(paths) = self.paths.take() {
            cleanup_blocking(&paths);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_guard_removes_files_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let job = PipelineJob::new(dir.path(), "dQw4w9WgXcQ", "137", "140");
        std::fs::write(job.video_path(), b"v").unwrap();
        std::fs::write(job.audio_path(), b"a").unwrap();

        drop(ScratchGuard::new(&job));
        assert!(!job.video_path().exists());
        assert!(!job.audio_path().exists());
    }

    #[test]
    fn test_disarmed_guard_leaves_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let job = PipelineJob::new(dir.path(), "dQw4w9WgXcQ", "137", "140");
        std::fs::write(job.output_path(), b"o").unwrap();

        ScratchGuard::new(&job).disarm();
        assert!(job.output_path().exists());
    }
}
