//! Clip model consumed by the compiler.
//!
//! Clips arrive from an external loading/validation stage fully defaulted and
//! with `position`/`end`/`duration` conflicts already resolved into a
//! [`Window`]. This module only carries the shapes; nothing here touches IO.

use std::path::PathBuf;

use crate::{
    core::{Timed, Window},
    error::{CinegraphError, CinegraphResult},
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clip {
    Video(VideoClip),
    Image(ImageClip),
    Color(ColorClip),
    Audio(AudioClip),
    Music(MusicClip),
    Text(TextClip),
    Subtitle(SubtitleClip),
    Effect(EffectClip),
    Watermark(WatermarkClip),
}

/// The subset of clip kinds that occupies screen space and forms the
/// picture track. Gap analysis, transitions, and the ledger are defined
/// over this view only.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PictureClip {
    Video(VideoClip),
    Image(ImageClip),
    Color(ColorClip),
}

impl PictureClip {
    pub fn transition(&self) -> Option<&TransitionSpec> {
        match self {
            Self::Video(c) => c.transition.as_ref(),
            Self::Image(c) => c.transition.as_ref(),
            Self::Color(c) => c.transition.as_ref(),
        }
    }
}

impl Timed for PictureClip {
    fn window(&self) -> Window {
        match self {
            Self::Video(c) => c.window,
            Self::Image(c) => c.window,
            Self::Color(c) => c.window,
        }
    }
}

impl Clip {
    /// Picture-track view of this clip, if it occupies screen space.
    pub fn as_picture(&self) -> Option<PictureClip> {
        match self {
            Self::Video(c) => Some(PictureClip::Video(c.clone())),
            Self::Image(c) => Some(PictureClip::Image(c.clone())),
            Self::Color(c) => Some(PictureClip::Color(c.clone())),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VideoClip {
    pub source: PathBuf,
    pub window: Window,
    /// Seek offset into the source file, seconds.
    #[serde(default)]
    pub source_start: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub fit: FitMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ImageClip {
    pub source: PathBuf,
    pub window: Window,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<crate::motion::MotionSpec>,
    #[serde(default)]
    pub fit: FitMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ColorClip {
    pub window: Window,
    pub fill: Fill,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AudioClip {
    pub source: PathBuf,
    pub window: Window,
    #[serde(default)]
    pub source_start: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

/// Background music: spans the whole export, looped to fit, and mixed in a
/// separate stage so per-clip mixing never attenuates it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MusicClip {
    pub source: PathBuf,
    #[serde(default)]
    pub source_start: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextClip {
    pub text: String,
    pub window: Window,
    #[serde(default)]
    pub mode: TextMode,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<AlphaEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_fx: Option<SizeEnvelope>,
    /// Explicit per-word (or per-char) display durations, seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_durations: Option<Vec<f64>>,
    /// Explicit absolute start timestamps per unit, seconds on the
    /// nominal timeline. Takes effect when `unit_durations` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<f64>>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SubtitleClip {
    pub window: Window,
    pub content: SubtitleContent,
    #[serde(default)]
    pub style: TextStyle,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubtitleContent {
    /// Words distributed across the clip window, each tagged with a
    /// highlight directive.
    Karaoke {
        text: String,
        #[serde(default)]
        highlight: Highlight,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit_durations: Option<Vec<f64>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamps: Option<Vec<f64>>,
    },
    /// Imported SubRip/WebVTT file; cue times are shifted by `offset`.
    File {
        path: PathBuf,
        #[serde(default)]
        offset: f64,
    },
    /// Free-form styled text shown for the whole window.
    Text { text: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    #[default]
    Instant,
    Gradual,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EffectClip {
    pub window: Window,
    pub effect: EffectKind,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EffectKind {
    Grayscale,
    Sepia,
    Blur { radius: f64 },
    Vignette,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WatermarkClip {
    pub source: PathBuf,
    #[serde(default)]
    pub anchor: WatermarkAnchor,
    #[serde(default = "default_watermark_margin")]
    pub margin_px: u32,
    #[serde(default = "default_volume")]
    pub opacity: f64,
    /// Watermark width as a fraction of canvas width.
    #[serde(default = "default_watermark_scale")]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "fill", rename_all = "snake_case")]
pub enum Fill {
    Solid { color: String },
    Gradient { from: String, to: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Scale to fit inside the frame, pad the remainder (letterbox).
    #[default]
    Contain,
    /// Scale to cover the frame, crop the overflow.
    Cover,
    /// Scale to the frame ignoring aspect ratio.
    Stretch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    #[default]
    Static,
    /// One word at a time, each replacing the last.
    WordReplace,
    /// Words accumulate left to right.
    WordSequential,
    /// Characters revealed one by one.
    CharReveal,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_file: Option<PathBuf>,
    #[serde(default = "default_font_size")]
    pub size: u32,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            size: default_font_size(),
            color: default_text_color(),
            border_color: None,
        }
    }
}

/// Overlay placement on the canvas. Percent values are of canvas size;
/// pixel values are absolute from the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub x: Coord,
    #[serde(default)]
    pub y: Coord,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coord {
    #[default]
    Center,
    Percent(f64),
    Px(i32),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaEnvelope {
    FadeIn { duration: f64 },
    FadeOut { duration: f64 },
    FadeInOut { fade_in: f64, fade_out: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeEnvelope {
    Pop,
    BouncePop,
    ScaleIn,
    Pulse,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
    CircleOpen,
}

impl TransitionKind {
    /// FFmpeg `xfade` transition name.
    pub fn xfade_name(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Dissolve => "dissolve",
            Self::WipeLeft => "wipeleft",
            Self::WipeRight => "wiperight",
            Self::WipeUp => "wipeup",
            Self::WipeDown => "wipedown",
            Self::SlideLeft => "slideleft",
            Self::SlideRight => "slideright",
            Self::CircleOpen => "circleopen",
        }
    }

    pub fn parse(s: &str) -> CinegraphResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fade" | "crossfade" => Ok(Self::Fade),
            "dissolve" => Ok(Self::Dissolve),
            "wipeleft" | "wipe_left" => Ok(Self::WipeLeft),
            "wiperight" | "wipe_right" => Ok(Self::WipeRight),
            "wipeup" | "wipe_up" => Ok(Self::WipeUp),
            "wipedown" | "wipe_down" => Ok(Self::WipeDown),
            "slideleft" | "slide_left" => Ok(Self::SlideLeft),
            "slideright" | "slide_right" => Ok(Self::SlideRight),
            "circleopen" | "circle_open" => Ok(Self::CircleOpen),
            other => Err(CinegraphError::validation(format!(
                "unknown transition kind '{other}'"
            ))),
        }
    }
}

fn default_volume() -> f64 {
    1.0
}

fn default_font_size() -> u32 {
    48
}

fn default_text_color() -> String {
    "white".to_string()
}

fn default_watermark_margin() -> u32 {
    24
}

fn default_watermark_scale() -> f64 {
    0.15
}
