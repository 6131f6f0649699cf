//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Subcommand;
use tracing::Level;
use vidmux_core::config::VidmuxConfig;
use vidmux_core::tracing_setup::init_tracing;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        /// Directory for in-flight job scratch files
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
        /// Path to the yt-dlp binary
        #[arg(long)]
        ytdlp: Option<PathBuf>,
        /// Path to the ffmpeg binary
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
        /// Console log level (error, warn, info, debug, trace)
        #[arg(long, default_value = "info")]
        log_level: Level,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve {
            bind,
            scratch_dir,
            ytdlp,
            ffmpeg,
            log_level,
        } => serve(bind, scratch_dir, ytdlp, ffmpeg, log_level).await,
    }
}

async fn serve(
    bind: SocketAddr,
    scratch_dir: Option<PathBuf>,
    ytdlp: Option<PathBuf>,
    ffmpeg: Option<PathBuf>,
    log_level: Level,
) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(log_level, None)?;

    let mut config = VidmuxConfig::default();
    config.server.bind_address = bind;
    if let Some(dir) = scratch_dir {
        config.scratch.directory = dir;
    }
    if let Some(binary) = ytdlp {
        config.fetch.ytdlp_binary = binary;
    }
    if let Some(binary) = ffmpeg {
        config.mux.ffmpeg_binary = binary;
    }

    vidmux_web::run_server(config).await
}
