//! Centralized configuration for Vidmux.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Vidmux components.
///
/// Groups related configuration settings into logical sections.
#[derive(Debug, Clone, Default)]
pub struct VidmuxConfig {
    pub server: ServerConfig,
    pub fetch: FetchConfig,
    pub scratch: ScratchConfig,
    pub mux: MuxConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the API server binds to
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".parse().expect("valid default address"),
        }
    }
}

/// Metadata and variant fetching configuration.
///
/// Controls the external metadata provider binary and the HTTP client
/// used for variant transfers.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Path or name of the yt-dlp binary
    pub ytdlp_binary: PathBuf,
    /// User agent for variant transfer requests
    pub user_agent: &'static str,
    /// Connection timeout for variant transfers; downloads themselves are
    /// not bounded since variant sizes vary widely
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            ytdlp_binary: PathBuf::from("yt-dlp"),
            user_agent: "vidmux/0.1.0",
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Scratch storage configuration.
///
/// The scratch directory holds all in-flight jobs' temporary files,
/// namespaced per job. It is created once at startup.
#[derive(Debug, Clone)]
pub struct ScratchConfig {
    /// Directory for per-job temporary files
    pub directory: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("vidmux"),
        }
    }
}

/// External mux process configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_binary: PathBuf,
    /// Audio codec the muxed output is transcoded to; video is always
    /// stream-copied
    pub audio_codec: &'static str,
    /// Audio bitrate passed to the encoder
    pub audio_bitrate: &'static str,
    /// Move the moov atom to the front of the output for playback that
    /// starts before the download completes
    pub faststart: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            audio_codec: "aac",
            audio_bitrate: "192k",
            faststart: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = VidmuxConfig::default();
        assert_eq!(config.mux.audio_codec, "aac");
        assert!(config.mux.faststart);
        assert_eq!(config.fetch.connect_timeout, Duration::from_secs(30));
        assert!(config.scratch.directory.ends_with("vidmux"));
    }
}
