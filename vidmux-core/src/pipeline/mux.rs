//! External mux process abstraction.
//!
//! Combining is delegated to an ffmpeg subprocess. The video stream is
//! copied bit-for-bit; the audio stream is transcoded to a codec that is
//! broadly compatible with the MP4 container, since the two source streams
//! may otherwise not share one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::PipelineError;
use crate::config::MuxConfig;

/// Abstraction over the external combine step, so tests can substitute a
/// muxer that does not require an ffmpeg installation.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Combines a video-only and an audio-only file into one MP4.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Mux` - Process failed to start, exited non-zero,
    ///   or reported a fatal stream error
    async fn combine(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<(), PipelineError>;

    /// Check if the mux binary is available and runnable.
    fn is_available(&self) -> bool;
}

/// Production muxer invoking the ffmpeg binary.
pub struct FfmpegMuxer {
    binary: PathBuf,
    audio_codec: &'static str,
    audio_bitrate: &'static str,
    faststart: bool,
}

impl FfmpegMuxer {
    pub fn new(config: &MuxConfig) -> Self {
        Self {
            binary: config.ffmpeg_binary.clone(),
            audio_codec: config.audio_codec,
            audio_bitrate: config.audio_bitrate,
            faststart: config.faststart,
        }
    }

    /// Assembles the ffmpeg argument list for one combine invocation.
    fn mux_args(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            video_path.into(),
            "-i".into(),
            audio_path.into(),
            // First input contributes the video stream, second the audio.
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            // Never re-encode video; transcode audio for container compatibility.
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            self.audio_codec.into(),
            "-b:a".into(),
            self.audio_bitrate.into(),
        ];
        if self.faststart {
            args.push("-movflags".into());
            args.push("+faststart".into());
        }
        args.push("-f".into());
        args.push("mp4".into());
        args.push(output_path.into());
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn combine(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<(), PipelineError> {
        info!(
            "Muxing {} + {} -> {}",
            video_path.display(),
            audio_path.display(),
            output_path.display()
        );

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(self.mux_args(video_path, audio_path, output_path));

        debug!("Executing mux command: {:?}", cmd);

        let output = cmd.output().await.map_err(|e| {
            error!("Failed to execute {}: {e}", self.binary.display());
            PipelineError::Mux {
                reason: format!("failed to execute {}: {e}", self.binary.display()),
            }
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            error!("Mux failed with exit code {}: {stderr}", output.status);
            return Err(PipelineError::Mux {
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    stderr.lines().last().unwrap_or("no diagnostic output")
                ),
            });
        }
        if !stderr.is_empty() {
            warn!("Mux stderr: {stderr}");
        }

        Ok(())
    }

    fn is_available(&self) -> bool {
        // Probe with the version command; any runnable binary answers it.
        std::process::Command::new(&self.binary)
            .arg("-version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn position_of(args: &[OsString], flag: &str) -> usize {
        args.iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("missing flag {flag}"))
    }

    #[test]
    fn test_mux_args_copy_video_and_transcode_audio() {
        let muxer = FfmpegMuxer::new(&MuxConfig::default());
        let args = muxer.mux_args(Path::new("v.part"), Path::new("a.part"), Path::new("o.mp4"));

        // The video stream is stream-copied, never re-encoded.
        assert_eq!(args[position_of(&args, "-c:v") + 1], "copy");
        assert_eq!(args[position_of(&args, "-c:a") + 1], "aac");
        assert_eq!(args[position_of(&args, "-movflags") + 1], "+faststart");
        assert_eq!(args[position_of(&args, "-f") + 1], "mp4");
        // Output path comes last so a unique per-job path is what gets written.
        assert_eq!(args.last().unwrap(), "o.mp4");
    }

    #[test]
    fn test_mux_args_without_faststart() {
        let config = MuxConfig {
            faststart: false,
            ..MuxConfig::default()
        };
        let args =
            FfmpegMuxer::new(&config).mux_args(Path::new("v"), Path::new("a"), Path::new("o"));
        assert!(!args.iter().any(|a| a == "-movflags"));
    }

    #[tokio::test]
    async fn test_mux_rejects_garbage_input() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("v.part");
        let audio = dir.path().join("a.part");
        let output = dir.path().join("out.mp4");
        std::fs::write(&video, b"not a video").unwrap();
        std::fs::write(&audio, b"not audio").unwrap();

        let muxer = FfmpegMuxer::new(&MuxConfig::default());
        let result = muxer.combine(&video, &audio, &output).await;

        // Fails the same way whether ffmpeg rejects the input or the
        // binary is absent entirely.
        assert!(matches!(result, Err(PipelineError::Mux { .. })));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_mux_error() {
        let dir = tempdir().unwrap();
        let config = MuxConfig {
            ffmpeg_binary: PathBuf::from("/nonexistent/ffmpeg"),
            ..MuxConfig::default()
        };
        let muxer = FfmpegMuxer::new(&config);
        assert!(!muxer.is_available());

        let result = muxer
            .combine(
                &dir.path().join("v"),
                &dir.path().join("a"),
                &dir.path().join("o"),
            )
            .await;
        assert!(matches!(result, Err(PipelineError::Mux { .. })));
    }
}
