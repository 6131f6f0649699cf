//! External metadata provider integration.
//!
//! Resolution is delegated to `yt-dlp` running in probe mode (`-J`), which
//! performs the platform fetch and emits one JSON document describing the
//! resource and every encoding variant it currently offers. The trait seam
//! lets tests substitute a canned provider so no test touches the network.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ResolveError, ResolvedMedia, SourceLocator, VariantDescriptor};
use crate::config::FetchConfig;

/// Abstraction over the platform metadata fetch.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetches current metadata and the full variant list for a locator.
    ///
    /// # Errors
    ///
    /// - `ResolveError::UpstreamFetch` - Provider failed or returned an
    ///   unparseable payload
    async fn fetch(&self, locator: &SourceLocator) -> Result<ResolvedMedia, ResolveError>;
}

/// Production provider shelling out to the yt-dlp binary.
pub struct YtDlpProvider {
    binary: PathBuf,
}

impl YtDlpProvider {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            binary: config.ytdlp_binary.clone(),
        }
    }
}

#[async_trait]
impl MetadataProvider for YtDlpProvider {
    async fn fetch(&self, locator: &SourceLocator) -> Result<ResolvedMedia, ResolveError> {
        debug!("Probing metadata for {}", locator);

        let output = tokio::process::Command::new(&self.binary)
            .arg("-J")
            .arg("--skip-download")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(locator.watch_url())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ResolveError::UpstreamFetch {
                reason: format!("failed to execute {}: {e}", self.binary.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = stderr.lines().last().unwrap_or("metadata probe failed");
            return Err(ResolveError::UpstreamFetch {
                reason: diagnostic.to_string(),
            });
        }

        let payload: ProbePayload =
            serde_json::from_slice(&output.stdout).map_err(|e| ResolveError::UpstreamFetch {
                reason: format!("unparseable probe payload: {e}"),
            })?;

        Ok(map_payload(payload, locator))
    }
}

/// Probe document emitted by `yt-dlp -J`. Only the fields Vidmux consumes
/// are modeled; everything else is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ProbePayload {
    title: Option<String>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_id: Option<String>,
    url: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    format_note: Option<String>,
    abr: Option<f64>,
}

/// Maps the raw probe payload into partitioned variant sets.
///
/// A format whose codec field is absent or the literal `"none"` lacks that
/// capability. Formats without an id or a fetch URL are unusable and are
/// dropped. Source order is preserved.
pub(crate) fn map_payload(payload: ProbePayload, locator: &SourceLocator) -> ResolvedMedia {
    let mut video_variants = Vec::new();
    let mut audio_variants = Vec::new();

    for format in payload.formats {
        let Some(variant_id) = format.format_id.filter(|id| !id.trim().is_empty()) else {
            continue;
        };
        let Some(fetch_locator) = format.url.filter(|u| !u.is_empty()) else {
            continue;
        };

        let vcodec = format.vcodec.unwrap_or_else(|| "none".to_string());
        let acodec = format.acodec.unwrap_or_else(|| "none".to_string());
        let has_video = vcodec != "none";
        let has_audio = acodec != "none";
        if !has_video && !has_audio {
            continue;
        }

        let quality_label = if has_video {
            format
                .height
                .map(|h| format!("{h}p"))
                .or(format.format_note)
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            format.format_note.unwrap_or_else(|| "audio".to_string())
        };

        let descriptor = VariantDescriptor {
            variant_id,
            has_video,
            has_audio,
            quality_label,
            container: format.ext.unwrap_or_else(|| "unknown".to_string()),
            codec: if has_video { vcodec } else { acodec },
            bitrate_kbps: if has_video { None } else { format.abr },
            fetch_locator,
        };

        if descriptor.has_video {
            video_variants.push(descriptor.clone());
        }
        if descriptor.has_audio {
            audio_variants.push(descriptor);
        }
    }

    ResolvedMedia {
        title: payload
            .title
            .unwrap_or_else(|| locator.video_id().to_string()),
        thumbnail: payload.thumbnail,
        author: payload.uploader,
        duration_secs: payload.duration,
        video_variants,
        audio_variants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "title": "Sample Upload",
        "thumbnail": "https://img.example/t.jpg",
        "uploader": "someone",
        "duration": 212.5,
        "formats": [
            {"format_id": "137", "url": "https://media.example/v", "ext": "mp4",
             "vcodec": "avc1.640028", "acodec": "none", "height": 1080},
            {"format_id": "140", "url": "https://media.example/a", "ext": "m4a",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5,
             "format_note": "medium"},
            {"format_id": "22", "url": "https://media.example/c", "ext": "mp4",
             "vcodec": "avc1.64001F", "acodec": "mp4a.40.2", "height": 720},
            {"format_id": "sb0", "url": "https://media.example/s", "ext": "mhtml",
             "vcodec": "none", "acodec": "none"},
            {"format_id": "", "url": "https://media.example/x"},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus"}
        ]
    }"#;

    fn mapped() -> ResolvedMedia {
        let payload: ProbePayload = serde_json::from_str(PROBE_JSON).unwrap();
        let locator = SourceLocator::parse("dQw4w9WgXcQ").unwrap();
        map_payload(payload, &locator)
    }

    #[test]
    fn test_map_payload_partitions_by_capability() {
        let media = mapped();
        assert_eq!(media.title, "Sample Upload");
        assert_eq!(media.author.as_deref(), Some("someone"));
        assert_eq!(media.duration_secs, Some(212.5));

        let video_ids: Vec<&str> = media
            .video_variants
            .iter()
            .map(|v| v.variant_id.as_str())
            .collect();
        let audio_ids: Vec<&str> = media
            .audio_variants
            .iter()
            .map(|v| v.variant_id.as_str())
            .collect();

        // Combined format 22 appears in both sets; storyboard, id-less and
        // url-less formats are dropped.
        assert_eq!(video_ids, ["137", "22"]);
        assert_eq!(audio_ids, ["140", "22"]);
    }

    #[test]
    fn test_map_payload_labels_and_bitrate() {
        let media = mapped();
        let video = &media.video_variants[0];
        assert_eq!(video.quality_label, "1080p");
        assert_eq!(video.codec, "avc1.640028");
        assert_eq!(video.bitrate_kbps, None);

        let audio = &media.audio_variants[0];
        assert_eq!(audio.quality_label, "medium");
        assert_eq!(audio.codec, "mp4a.40.2");
        assert_eq!(audio.bitrate_kbps, Some(129.5));
    }

    #[test]
    fn test_map_payload_falls_back_to_video_id_title() {
        let payload: ProbePayload = serde_json::from_str(r#"{"formats": []}"#).unwrap();
        let locator = SourceLocator::parse("dQw4w9WgXcQ").unwrap();
        let media = map_payload(payload, &locator);
        assert_eq!(media.title, "dQw4w9WgXcQ");
        assert!(media.video_variants.is_empty());
        assert!(media.audio_variants.is_empty());
    }
}
