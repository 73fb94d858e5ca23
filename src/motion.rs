//! Pan/zoom motion synthesis for still images.
//!
//! A [`MotionSpec`] (preset plus optional overrides) resolves to
//! [`MotionParams`]: endpoint zoom and normalized pan positions with an
//! easing curve. Per-frame values are closed-form in normalized progress
//! `t in [0,1]`, evaluable both in Rust (for tests) and as FFmpeg `zoompan`
//! expressions (for the generated graph).

use crate::{
    core::Canvas,
    error::{CinegraphError, CinegraphResult},
};

/// Minimum zoom injected when a pan is requested without an explicit zoom.
/// At zoom 1.0 the crop window equals the full source, the pan displacement
/// term `(iw - iw/zoom)` is zero, and the pan is invisible.
pub const MIN_PAN_ZOOM: f64 = 1.1;

/// Oversized intermediate canvas floor, px. Motion is rendered against this
/// before the final crop so integer-pixel sampling does not stair-step
/// sub-pixel movement.
pub const MOTION_CANVAS_FLOOR: u32 = 4000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    #[default]
    SineInOut,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::SineInOut => 0.5 - 0.5 * (std::f64::consts::PI * t).cos(),
        }
    }

    /// The same curve as an FFmpeg expression over progress expression `t`.
    pub fn ffmpeg_expr(self, t: &str) -> String {
        match self {
            Self::Linear => format!("({t})"),
            Self::InQuad => format!("pow({t},2)"),
            Self::OutQuad => format!("(1-pow(1-({t}),2))"),
            Self::SineInOut => format!("(0.5-0.5*cos(PI*({t})))"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    Start,
    End,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPreset {
    #[default]
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    /// Pan axis chosen from source vs output aspect mismatch, direction
    /// from the anchor hint.
    Smart,
    Custom,
}

/// Declarative motion request. Any explicit field overrides the preset's
/// corresponding default independently.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MotionSpec {
    #[serde(default)]
    pub preset: MotionPreset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease: Option<Ease>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

/// Resolved endpoints. Pan positions are normalized: 0 puts the crop window
/// at the left/top extreme of the pannable range, 1 at the right/bottom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionParams {
    pub start_zoom: f64,
    pub end_zoom: f64,
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub ease: Ease,
}

#[derive(Clone, Copy, Debug, Default)]
struct PresetDefaults {
    zoom: Option<(f64, f64)>,
    x: (f64, f64),
    y: (f64, f64),
}

fn preset_defaults(
    preset: MotionPreset,
    anchor: Anchor,
    output: Canvas,
    source: Option<(u32, u32)>,
) -> PresetDefaults {
    let centered = PresetDefaults {
        zoom: None,
        x: (0.5, 0.5),
        y: (0.5, 0.5),
    };
    match preset {
        MotionPreset::ZoomIn => PresetDefaults {
            zoom: Some((1.0, 1.15)),
            ..centered
        },
        MotionPreset::ZoomOut => PresetDefaults {
            zoom: Some((1.15, 1.0)),
            ..centered
        },
        MotionPreset::PanLeft => PresetDefaults {
            x: (1.0, 0.0),
            ..centered
        },
        MotionPreset::PanRight => PresetDefaults {
            x: (0.0, 1.0),
            ..centered
        },
        MotionPreset::PanUp => PresetDefaults {
            y: (1.0, 0.0),
            ..centered
        },
        MotionPreset::PanDown => PresetDefaults {
            y: (0.0, 1.0),
            ..centered
        },
        MotionPreset::Smart => {
            let out_ar = output.aspect();
            let src_ar = source
                .filter(|&(w, h)| w > 0 && h > 0)
                .map(|(w, h)| f64::from(w) / f64::from(h))
                .unwrap_or(out_ar);
            // Pan along the axis with the larger aspect mismatch: a source
            // wider than the output has horizontal slack, a taller one
            // vertical slack.
            let horizontal = src_ar >= out_ar;
            let span = match anchor {
                Anchor::Start => (0.0, 1.0),
                Anchor::End => (1.0, 0.0),
            };
            if horizontal {
                PresetDefaults { x: span, ..centered }
            } else {
                PresetDefaults { y: span, ..centered }
            }
        }
        MotionPreset::Custom => centered,
    }
}

/// Resolve a motion spec against output and (optional) source dimensions.
pub fn resolve(
    spec: &MotionSpec,
    output: Canvas,
    source: Option<(u32, u32)>,
) -> CinegraphResult<MotionParams> {
    let anchor = spec.anchor.unwrap_or_default();
    let defaults = preset_defaults(spec.preset, anchor, output, source);

    let zoom_explicit = spec.start_zoom.is_some() || spec.end_zoom.is_some();
    let default_zoom = defaults.zoom.unwrap_or((1.0, 1.0));

    let mut params = MotionParams {
        start_zoom: spec.start_zoom.unwrap_or(default_zoom.0),
        end_zoom: spec.end_zoom.unwrap_or(default_zoom.1),
        start_x: spec.start_x.unwrap_or(defaults.x.0),
        start_y: spec.start_y.unwrap_or(defaults.y.0),
        end_x: spec.end_x.unwrap_or(defaults.x.1),
        end_y: spec.end_y.unwrap_or(defaults.y.1),
        ease: spec.ease.unwrap_or_default(),
    };

    for (name, v) in [
        ("start_zoom", params.start_zoom),
        ("end_zoom", params.end_zoom),
    ] {
        if !v.is_finite() || v <= 0.0 {
            return Err(CinegraphError::validation(format!(
                "motion {name} must be finite and > 0, got {v}"
            )));
        }
    }

    let pans = params.start_x != params.end_x || params.start_y != params.end_y;
    if pans && !zoom_explicit && defaults.zoom.is_none() {
        // Without this the pan displacement collapses to zero at zoom 1.0.
        params.start_zoom = params.start_zoom.max(MIN_PAN_ZOOM);
        params.end_zoom = params.end_zoom.max(MIN_PAN_ZOOM);
    }

    Ok(params)
}

impl MotionParams {
    pub fn zoom_at(&self, t: f64) -> f64 {
        lerp(self.start_zoom, self.end_zoom, self.ease.apply(t))
    }

    pub fn x_at(&self, t: f64) -> f64 {
        lerp(self.start_x, self.end_x, self.ease.apply(t))
    }

    pub fn y_at(&self, t: f64) -> f64 {
        lerp(self.start_y, self.end_y, self.ease.apply(t))
    }

    /// Intermediate canvas width for a given output canvas: several times
    /// the output width with a hard floor, kept even for yuv scaling.
    pub fn canvas_width(output: Canvas) -> u32 {
        let w = (output.width * 4).max(MOTION_CANVAS_FLOOR);
        w + (w & 1)
    }

    /// `zoompan` filter arguments producing exactly `frames` output frames
    /// at `output` size. Progress is `on/(frames-1)` so the last frame
    /// lands exactly on the end values.
    pub fn zoompan_args(&self, frames: u64, output: Canvas, fps: u32) -> String {
        let progress = if frames > 1 {
            format!("on/{}", frames - 1)
        } else {
            "0".to_string()
        };
        let eased = self.ease.ffmpeg_expr(&progress);

        let zoom = lerp_expr(self.start_zoom, self.end_zoom, &eased);
        let x_pos = lerp_expr(self.start_x, self.end_x, &eased);
        let y_pos = lerp_expr(self.start_y, self.end_y, &eased);

        format!(
            "z='{zoom}':x='(iw-iw/zoom)*{x_pos}':y='(ih-ih/zoom)*{y_pos}':d={frames}:s={}x{}:fps={fps}",
            output.width, output.height
        )
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_expr(a: f64, b: f64, eased: &str) -> String {
    if a == b {
        format!("{a:.6}")
    } else {
        format!("{a:.6}+{:.6}*{eased}", b - a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUT: Canvas = Canvas {
        width: 1280,
        height: 720,
    };

    #[test]
    fn ease_endpoints_are_stable() {
        for ease in [Ease::Linear, Ease::InQuad, Ease::OutQuad, Ease::SineInOut] {
            assert!((ease.apply(0.0)).abs() < 1e-12);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn zoom_in_curve_matches_raised_cosine() {
        let spec = MotionSpec {
            preset: MotionPreset::ZoomIn,
            ease: Some(Ease::SineInOut),
            ..Default::default()
        };
        let params = resolve(&spec, OUT, None).unwrap();

        // 3s at 30fps.
        let frames = 90u64;
        let mut prev = f64::NEG_INFINITY;
        for frame in 0..frames {
            let t = frame as f64 / (frames - 1) as f64;
            let z = params.zoom_at(t);
            assert!(z >= prev, "zoom must be monotone");
            prev = z;
        }
        assert!((params.zoom_at(0.0) - 1.0).abs() < 1e-9);
        assert!((params.zoom_at(1.0) - 1.15).abs() < 1e-9);
        assert!((params.zoom_at(0.5) - 1.075).abs() < 1e-3);
    }

    #[test]
    fn explicit_fields_override_preset_independently() {
        let spec = MotionSpec {
            preset: MotionPreset::ZoomIn,
            end_zoom: Some(1.3),
            ..Default::default()
        };
        let params = resolve(&spec, OUT, None).unwrap();
        assert_eq!(params.start_zoom, 1.0); // preset default kept
        assert_eq!(params.end_zoom, 1.3);
    }

    #[test]
    fn pan_without_zoom_gets_min_pan_zoom() {
        let spec = MotionSpec {
            preset: MotionPreset::PanRight,
            ..Default::default()
        };
        let params = resolve(&spec, OUT, None).unwrap();
        assert_eq!(params.start_zoom, MIN_PAN_ZOOM);
        assert_eq!(params.end_zoom, MIN_PAN_ZOOM);
        assert_eq!((params.start_x, params.end_x), (0.0, 1.0));
    }

    #[test]
    fn pan_with_explicit_zoom_keeps_it() {
        let spec = MotionSpec {
            preset: MotionPreset::PanRight,
            start_zoom: Some(1.05),
            end_zoom: Some(1.05),
            ..Default::default()
        };
        let params = resolve(&spec, OUT, None).unwrap();
        assert_eq!(params.start_zoom, 1.05);
    }

    #[test]
    fn smart_pans_along_mismatched_axis() {
        // Source much wider than a 16:9 output: horizontal pan.
        let wide = resolve(
            &MotionSpec {
                preset: MotionPreset::Smart,
                ..Default::default()
            },
            OUT,
            Some((4000, 1000)),
        )
        .unwrap();
        assert_ne!(wide.start_x, wide.end_x);
        assert_eq!(wide.start_y, wide.end_y);

        // Portrait source against a landscape output: vertical pan.
        let tall = resolve(
            &MotionSpec {
                preset: MotionPreset::Smart,
                anchor: Some(Anchor::End),
                ..Default::default()
            },
            OUT,
            Some((1000, 2000)),
        )
        .unwrap();
        assert_eq!(tall.start_x, tall.end_x);
        assert_eq!((tall.start_y, tall.end_y), (1.0, 0.0));
    }

    #[test]
    fn degenerate_zoom_is_rejected() {
        let spec = MotionSpec {
            start_zoom: Some(0.0),
            ..Default::default()
        };
        assert!(resolve(&spec, OUT, None).is_err());
    }

    #[test]
    fn motion_canvas_has_floor_and_is_even() {
        assert_eq!(MotionParams::canvas_width(OUT), 5120);
        let small = Canvas {
            width: 640,
            height: 360,
        };
        assert_eq!(MotionParams::canvas_width(small), 4000);
    }

    #[test]
    fn zoompan_args_pin_frame_count_and_size() {
        let params = resolve(
            &MotionSpec {
                preset: MotionPreset::ZoomIn,
                ease: Some(Ease::Linear),
                ..Default::default()
            },
            OUT,
            None,
        )
        .unwrap();
        let args = params.zoompan_args(90, OUT, 30);
        assert!(args.contains("d=90"));
        assert!(args.contains("s=1280x720"));
        assert!(args.contains("fps=30"));
        assert!(args.contains("on/89"));
    }
}
