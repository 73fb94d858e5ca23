//! Media probing seam.
//!
//! The compiler never decodes media itself; it only needs per-source
//! metadata to clamp requested clip windows to what actually exists.
//! [`FfprobeProber`] shells out to `ffprobe`; tests supply a stub.

use std::path::Path;

use crate::error::{CinegraphError, CinegraphResult};

#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
    pub rotation_deg: i32,
    pub has_audio: bool,
    pub sample_rate: u32,
}

impl MediaInfo {
    /// Display dimensions after applying source rotation metadata.
    pub fn oriented(&self) -> (u32, u32) {
        if self.rotation_deg.rem_euclid(180) == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

pub trait MediaProber {
    fn probe(&self, path: &Path) -> CinegraphResult<MediaInfo>;
}

/// Probes via the system `ffprobe` binary, same approach as the encoder
/// side: no native FFmpeg dev headers required.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfprobeProber;

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> CinegraphResult<MediaInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeTags {
            rotate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            sample_rate: Option<String>,
            tags: Option<ProbeTags>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| CinegraphError::media(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(CinegraphError::media(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| CinegraphError::media(format!("ffprobe json parse failed: {e}")))?;

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let audio = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));

        let duration_sec = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        let rotation_deg = video
            .and_then(|s| s.tags.as_ref())
            .and_then(|t| t.rotate.as_ref())
            .and_then(|r| r.parse::<i32>().ok())
            .unwrap_or(0);

        let sample_rate = audio
            .and_then(|s| s.sample_rate.as_ref())
            .and_then(|r| r.parse::<u32>().ok())
            .unwrap_or(0);

        Ok(MediaInfo {
            duration_sec,
            width: video.and_then(|s| s.width).unwrap_or(0),
            height: video.and_then(|s| s.height).unwrap_or(0),
            rotation_deg,
            has_audio: audio.is_some(),
            sample_rate,
        })
    }
}

/// Fixed-answer prober for tests: returns registered metadata, or a
/// generous default so clamping never triggers unless a test asks for it.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StubProber {
    pub media: std::collections::HashMap<std::path::PathBuf, MediaInfo>,
}

#[cfg(test)]
impl MediaProber for StubProber {
    fn probe(&self, path: &Path) -> CinegraphResult<MediaInfo> {
        Ok(self.media.get(path).cloned().unwrap_or(MediaInfo {
            duration_sec: 60.0,
            width: 1920,
            height: 1080,
            rotation_deg: 0,
            has_audio: true,
            sample_rate: 48_000,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oriented_swaps_on_quarter_turns() {
        let info = MediaInfo {
            duration_sec: 1.0,
            width: 1920,
            height: 1080,
            rotation_deg: 90,
            has_audio: false,
            sample_rate: 0,
        };
        assert_eq!(info.oriented(), (1080, 1920));

        let upright = MediaInfo {
            rotation_deg: 180,
            ..info
        };
        assert_eq!(upright.oriented(), (1920, 1080));

        let neg = MediaInfo {
            rotation_deg: -90,
            ..upright
        };
        assert_eq!(neg.oriented(), (1080, 1920));
    }
}
