//! Source locator validation and variant resolution.
//!
//! A source locator identifies one remote media resource. Resolution maps
//! it to the full set of encoding variants the platform currently offers,
//! partitioned into video-capable and audio-capable sets so a caller can
//! pick one of each for the download pipeline.

pub mod provider;

use std::fmt;

use serde::Serialize;
use url::Url;

pub use provider::{MetadataProvider, YtDlpProvider};

/// Errors that can occur while resolving a source locator.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid source locator: {input}")]
    InvalidLocator { input: String },

    #[error("upstream metadata fetch failed: {reason}")]
    UpstreamFetch { reason: String },
}

/// A validated reference to one remote media resource.
///
/// Construction via [`SourceLocator::parse`] is the validity check the rest
/// of the system relies on: a `SourceLocator` value always carries a
/// well-formed video id, so no network or disk work ever starts for a
/// malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    video_id: String,
}

impl SourceLocator {
    /// Parses a raw caller-supplied locator.
    ///
    /// Accepts `youtube.com/watch?v=`, `youtu.be/`, `youtube.com/shorts/`
    /// and `youtube.com/embed/` URL forms, or a bare 11-character video id.
    ///
    /// # Errors
    ///
    /// - `ResolveError::InvalidLocator` - Input matches none of the accepted shapes
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let raw = raw.trim();
        if is_video_id(raw) {
            return Ok(Self {
                video_id: raw.to_string(),
            });
        }

        let invalid = || ResolveError::InvalidLocator {
            input: raw.to_string(),
        };

        let url = Url::parse(raw).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }

        let host = url.host_str().ok_or_else(invalid)?;
        let candidate = match host.trim_start_matches("www.") {
            "youtu.be" => url.path_segments().and_then(|mut parts| parts.next()),
            "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
                let mut parts = url.path_segments().ok_or_else(invalid)?;
                match parts.next() {
                    Some("watch") => {
                        return url
                            .query_pairs()
                            .find(|(key, _)| key == "v")
                            .map(|(_, value)| value.into_owned())
                            .filter(|id| is_video_id(id))
                            .map(|video_id| Self { video_id })
                            .ok_or_else(invalid);
                    }
                    Some("shorts") | Some("embed") | Some("live") => parts.next(),
                    _ => None,
                }
            }
            _ => None,
        };

        candidate
            .filter(|id| is_video_id(id))
            .map(|id| Self {
                video_id: id.to_string(),
            })
            .ok_or_else(invalid)
    }

    /// Returns the canonical 11-character video id.
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Returns the canonical watch URL handed to the metadata provider.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.video_id)
    }
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// One available encoding of a resolved media resource.
///
/// Variants are produced in bulk from a single metadata fetch and never
/// mutated. Fetch locators are short-lived, so a descriptor must not be
/// trusted across resolutions; the pipeline re-resolves before downloading.
#[derive(Debug, Clone, Serialize)]
pub struct VariantDescriptor {
    /// Provider-assigned identifier, unique within one resolution
    pub variant_id: String,
    pub has_video: bool,
    pub has_audio: bool,
    /// Human-readable quality, e.g. "1080p" or "medium"
    pub quality_label: String,
    /// Container extension, e.g. "mp4" or "webm"
    pub container: String,
    /// Dominant codec: video codec when present, audio codec otherwise
    pub codec: String,
    /// Audio bitrate in kbit/s; only meaningful for audio variants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<f64>,
    /// Short-lived direct URL for the variant's stream
    pub fetch_locator: String,
}

/// Result of resolving a source locator: presentation metadata plus the
/// variant list partitioned by capability.
///
/// A variant carrying both video and audio appears in both sets. Source
/// order is preserved within each set.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMedia {
    pub title: String,
    pub thumbnail: Option<String>,
    pub author: Option<String>,
    pub duration_secs: Option<f64>,
    pub video_variants: Vec<VariantDescriptor>,
    pub audio_variants: Vec<VariantDescriptor>,
}

impl ResolvedMedia {
    /// Looks up a video-only variant, rejecting ids that are absent or that
    /// also carry audio.
    pub fn video_only_variant(&self, variant_id: &str) -> Option<&VariantDescriptor> {
        self.video_variants
            .iter()
            .find(|v| v.variant_id == variant_id && v.has_video && !v.has_audio)
    }

    /// Looks up an audio-only variant, rejecting ids that are absent or that
    /// also carry video.
    pub fn audio_only_variant(&self, variant_id: &str) -> Option<&VariantDescriptor> {
        self.audio_variants
            .iter()
            .find(|v| v.variant_id == variant_id && v.has_audio && !v.has_video)
    }
}

/// Reduces an untrusted title to a filesystem- and header-safe filename stem.
///
/// Keeps ASCII alphanumerics, hyphen, underscore and space; everything else
/// is stripped. Falls back to `fallback` when nothing survives.
pub fn sanitize_title(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, has_video: bool, has_audio: bool) -> VariantDescriptor {
        VariantDescriptor {
            variant_id: id.to_string(),
            has_video,
            has_audio,
            quality_label: "720p".to_string(),
            container: "mp4".to_string(),
            codec: "avc1".to_string(),
            bitrate_kbps: None,
            fetch_locator: format!("https://media.example/{id}"),
        }
    }

    #[test]
    fn test_locator_accepts_known_shapes() {
        let cases = [
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ];
        for case in cases {
            let locator = SourceLocator::parse(case).unwrap();
            assert_eq!(locator.video_id(), "dQw4w9WgXcQ", "case: {case}");
        }
    }

    #[test]
    fn test_locator_rejects_bad_shapes() {
        let cases = [
            "",
            "bad-url",
            "ftp://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch",
            "https://www.youtube.com/watch?v=too-short",
            "https://youtu.be/",
            "dQw4w9WgXc!",
        ];
        for case in cases {
            let result = SourceLocator::parse(case);
            assert!(
                matches!(result, Err(ResolveError::InvalidLocator { .. })),
                "case should be rejected: {case}"
            );
        }
    }

    #[test]
    fn test_watch_url_is_canonical() {
        let locator = SourceLocator::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(
            locator.watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_variant_lookup_enforces_roles() {
        let media = ResolvedMedia {
            title: "t".to_string(),
            thumbnail: None,
            author: None,
            duration_secs: None,
            video_variants: vec![variant("137", true, false), variant("22", true, true)],
            audio_variants: vec![variant("140", false, true), variant("22", true, true)],
        };

        assert!(media.video_only_variant("137").is_some());
        assert!(media.audio_only_variant("140").is_some());
        // Combined variants are present in both sets but valid for neither role.
        assert!(media.video_only_variant("22").is_none());
        assert!(media.audio_only_variant("22").is_none());
        assert!(media.video_only_variant("missing").is_none());
    }

    #[test]
    fn test_sanitize_title_strips_unsafe_characters() {
        assert_eq!(
            sanitize_title("My Video: The \"Best\" (2024)!", "id"),
            "My Video The Best 2024"
        );
        assert_eq!(sanitize_title("  spaced out  ", "id"), "spaced out");
        assert_eq!(sanitize_title("../../etc/passwd", "id"), "etcpasswd");
        assert_eq!(sanitize_title("归去来兮", "dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(sanitize_title("", "dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }
}
