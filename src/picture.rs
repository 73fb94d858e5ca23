//! Picture track assembly.
//!
//! Emits one normalized stream per picture clip (trimmed, fitted to the
//! target frame, constant fps, yuv420p, square pixels), then sequences the
//! streams boundary by boundary: plain concat, or an `xfade` that consumes
//! overlap time and compresses the timeline. Every clip records its
//! cumulative transition overlap in the export's ledger as it is processed.

use std::{collections::HashMap, path::PathBuf};

use crate::{
    context::{CompileConfig, CompileContext},
    core::{TIME_EPSILON, Canvas, Timed, fmt_secs},
    error::CinegraphResult,
    gradient,
    graph::{Label, StreamKind},
    model::{Fill, FitMode, PictureClip},
    motion::{self, MotionParams},
    probe::MediaInfo,
};

#[derive(Clone, Debug)]
pub struct PictureOutput {
    pub label: Label,
    /// Total picture duration after transition compression.
    pub duration: f64,
}

/// Scale-and-frame filter text for a fit mode against the target canvas.
fn fit_filter(fit: FitMode, canvas: Canvas) -> String {
    let (w, h) = (canvas.width, canvas.height);
    match fit {
        FitMode::Contain => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
        ),
        FitMode::Cover => format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"),
        FitMode::Stretch => format!("scale={w}:{h}"),
    }
}

/// Oversized intermediate frame for motion rendering, output aspect, even.
fn motion_canvas(canvas: Canvas) -> (u32, u32) {
    let cw = MotionParams::canvas_width(canvas);
    let ch = ((u64::from(cw) * u64::from(canvas.height)) / u64::from(canvas.width)) as u32;
    (cw, ch + (ch & 1))
}

/// Requested duration clamped to what the prober says the source has left
/// after `source_start`. Recovered locally, never fatal.
fn clamp_duration(
    source: &std::path::Path,
    requested: f64,
    source_start: f64,
    media: &HashMap<PathBuf, MediaInfo>,
) -> f64 {
    let Some(info) = media.get(source) else {
        return requested;
    };
    if info.duration_sec <= 0.0 {
        return requested;
    }
    let available = (info.duration_sec - source_start).max(0.0);
    if requested > available + TIME_EPSILON {
        tracing::warn!(
            source = %source.display(),
            requested,
            available,
            "clip requests more source duration than available; clamping"
        );
        available
    } else {
        requested
    }
}

struct ClipStream {
    label: Label,
    duration: f64,
    position: f64,
    transition: Option<(crate::model::TransitionKind, f64)>,
}

fn emit_clip_stream(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    clip: &PictureClip,
    media: &HashMap<PathBuf, MediaInfo>,
) -> CinegraphResult<ClipStream> {
    let canvas = cfg.canvas();
    let transition = clip.transition().map(|t| (t.kind, t.duration));
    let position = clip.position();

    let (label, duration) = match clip {
        PictureClip::Video(c) => {
            let duration = clamp_duration(&c.source, c.window.duration(), c.source_start, media);
            let input = ctx.add_input(&c.source);
            let src = Label::Source {
                input,
                kind: StreamKind::Video,
            };
            let filter = format!(
                "trim=start={}:end={},setpts=PTS-STARTPTS,fps={},{},format=yuv420p,setsar=1",
                fmt_secs(c.source_start),
                fmt_secs(c.source_start + duration),
                cfg.fps,
                fit_filter(c.fit, canvas),
            );
            (ctx.graph.chain(src, filter, "v"), duration)
        }
        PictureClip::Image(c) => {
            let duration = c.window.duration();
            let frames = (duration * f64::from(cfg.fps)).round().max(1.0) as u64;
            let input = ctx.add_input(&c.source);
            let src = Label::Source {
                input,
                kind: StreamKind::Video,
            };
            let filter = match &c.motion {
                Some(spec) => {
                    let source_dims = media.get(&c.source).map(|i| i.oriented());
                    let params = motion::resolve(spec, canvas, source_dims)?;
                    let (cw, ch) = motion_canvas(canvas);
                    format!(
                        "scale={cw}:{ch}:force_original_aspect_ratio=increase:flags=lanczos,\
                         crop={cw}:{ch},zoompan={},format=yuv420p,setsar=1",
                        params.zoompan_args(frames, canvas, cfg.fps),
                    )
                }
                None => format!(
                    "{},zoompan=z='1':d={frames}:s={}x{}:fps={},format=yuv420p,setsar=1",
                    fit_filter(c.fit, canvas),
                    canvas.width,
                    canvas.height,
                    cfg.fps,
                ),
            };
            (ctx.graph.chain(src, filter, "v"), duration)
        }
        PictureClip::Color(c) => {
            let duration = c.window.duration();
            match &c.fill {
                Fill::Solid { color } => {
                    let filter = format!(
                        "color=c={color}:size={}x{}:rate={}:duration={},format=yuv420p,setsar=1",
                        canvas.width,
                        canvas.height,
                        cfg.fps,
                        fmt_secs(duration),
                    );
                    (ctx.graph.source(filter, "v"), duration)
                }
                Fill::Gradient { from, to } => {
                    let png = gradient::write_gradient_png(&cfg.temp_dir, canvas, from, to)?;
                    let input = ctx.add_input(&png);
                    ctx.add_artifact(png);
                    let src = Label::Source {
                        input,
                        kind: StreamKind::Video,
                    };
                    let frames = (duration * f64::from(cfg.fps)).round().max(1.0) as u64;
                    let filter = format!(
                        "{},zoompan=z='1':d={frames}:s={}x{}:fps={},format=yuv420p,setsar=1",
                        fit_filter(FitMode::Stretch, canvas),
                        canvas.width,
                        canvas.height,
                        cfg.fps,
                    );
                    (ctx.graph.chain(src, filter, "v"), duration)
                }
            }
        }
    };

    Ok(ClipStream {
        label,
        duration,
        position,
        transition,
    })
}

/// Build the whole picture track. Expects a gap-filled, position-ordered
/// track; returns `None` when there are no picture clips at all.
pub fn build_picture_track(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    clips: &[PictureClip],
    media: &HashMap<PathBuf, MediaInfo>,
) -> CinegraphResult<Option<PictureOutput>> {
    if clips.is_empty() {
        return Ok(None);
    }

    let mut streams = Vec::with_capacity(clips.len());
    for clip in clips {
        streams.push(emit_clip_stream(ctx, cfg, clip, media)?);
    }

    let mut iter = streams.into_iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    // A transition on the first clip has no predecessor to overlap with.
    ctx.ledger.record(first.position, 0.0)?;

    let mut current = first.label;
    let mut total = first.duration;

    for next in iter {
        match next.transition {
            Some((kind, requested)) if requested > TIME_EPSILON => {
                let overlap = requested.min(total).min(next.duration);
                if overlap + TIME_EPSILON < requested {
                    tracing::warn!(
                        requested,
                        overlap,
                        "transition longer than adjoining clip; clamping"
                    );
                }
                ctx.ledger.record(next.position, overlap)?;
                let offset = total - overlap;
                let out = ctx.graph.alloc("v");
                ctx.graph.add(
                    vec![current, next.label],
                    format!(
                        "xfade=transition={}:duration={}:offset={}",
                        kind.xfade_name(),
                        fmt_secs(overlap),
                        fmt_secs(offset),
                    ),
                    vec![out.clone()],
                );
                current = out;
                total += next.duration - overlap;
            }
            _ => {
                ctx.ledger.record(next.position, 0.0)?;
                let out = ctx.graph.alloc("v");
                ctx.graph.add(
                    vec![current, next.label],
                    "concat=n=2:v=1:a=0",
                    vec![out.clone()],
                );
                current = out;
                total += next.duration;
            }
        }
    }

    tracing::debug!(clips = clips.len(), duration = total, "picture track built");
    Ok(Some(PictureOutput {
        label: current,
        duration: total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::Window,
        model::{ColorClip, TransitionKind, TransitionSpec, VideoClip},
    };

    fn cfg() -> CompileConfig {
        CompileConfig::new(1280, 720, 30)
    }

    fn color(position: f64, end: f64, transition: Option<TransitionSpec>) -> PictureClip {
        PictureClip::Color(ColorClip {
            window: Window::new(position, end).unwrap(),
            fill: Fill::Solid {
                color: "black".to_string(),
            },
            transition,
        })
    }

    fn fade(duration: f64) -> Option<TransitionSpec> {
        Some(TransitionSpec {
            kind: TransitionKind::Fade,
            duration,
        })
    }

    #[test]
    fn concat_only_duration_is_clip_sum() {
        let mut ctx = CompileContext::new();
        let clips = vec![
            color(0.0, 3.0, None),
            color(3.0, 5.0, None),
            color(5.0, 9.0, None),
        ];
        let out = build_picture_track(&mut ctx, &cfg(), &clips, &HashMap::new())
            .unwrap()
            .unwrap();
        assert!((out.duration - 9.0).abs() < 1e-9);
        assert_eq!(ctx.ledger.total(), 0.0);
        assert!(ctx.graph.render().contains("concat=n=2:v=1:a=0"));
        assert!(!ctx.graph.render().contains("xfade"));
    }

    #[test]
    fn transitions_compress_total_duration() {
        let mut ctx = CompileContext::new();
        let clips = vec![
            color(0.0, 5.0, None),
            color(5.0, 10.0, fade(0.5)),
            color(10.0, 15.0, fade(1.0)),
        ];
        let out = build_picture_track(&mut ctx, &cfg(), &clips, &HashMap::new())
            .unwrap()
            .unwrap();
        assert!((out.duration - 13.5).abs() < 1e-9);
        assert!((ctx.ledger.total() - 1.5).abs() < 1e-9);

        let graph = ctx.graph.render();
        assert!(graph.contains("xfade=transition=fade:duration=0.5000:offset=4.5000"));
        // Second fade starts at compressed end 9.5 - 1.0.
        assert!(graph.contains("xfade=transition=fade:duration=1.0000:offset=8.5000"));
    }

    #[test]
    fn each_boundary_is_decided_independently() {
        let mut ctx = CompileContext::new();
        let clips = vec![
            color(0.0, 4.0, None),
            color(4.0, 6.0, fade(0.5)),
            color(6.0, 8.0, None),
        ];
        let out = build_picture_track(&mut ctx, &cfg(), &clips, &HashMap::new())
            .unwrap()
            .unwrap();
        assert!((out.duration - 7.5).abs() < 1e-9);
        let graph = ctx.graph.render();
        assert!(graph.contains("xfade"));
        assert!(graph.contains("concat"));
    }

    #[test]
    fn video_window_is_clamped_to_probed_duration() {
        let mut media = HashMap::new();
        media.insert(
            PathBuf::from("short.mp4"),
            MediaInfo {
                duration_sec: 2.0,
                width: 1920,
                height: 1080,
                rotation_deg: 0,
                has_audio: false,
                sample_rate: 0,
            },
        );
        let clip = PictureClip::Video(VideoClip {
            source: "short.mp4".into(),
            window: Window::new(0.0, 5.0).unwrap(),
            source_start: 0.0,
            muted: false,
            volume: 1.0,
            fit: FitMode::Contain,
            transition: None,
        });
        let mut ctx = CompileContext::new();
        let out = build_picture_track(&mut ctx, &cfg(), &[clip], &media)
            .unwrap()
            .unwrap();
        assert!((out.duration - 2.0).abs() < 1e-9);
        assert!(ctx.graph.render().contains("trim=start=0.0000:end=2.0000"));
    }

    #[test]
    fn motion_images_render_exact_frame_counts() {
        let clip = PictureClip::Image(crate::model::ImageClip {
            source: "photo.jpg".into(),
            window: Window::new(0.0, 3.0).unwrap(),
            motion: Some(crate::motion::MotionSpec::default()),
            fit: FitMode::Contain,
            transition: None,
        });
        let mut ctx = CompileContext::new();
        build_picture_track(&mut ctx, &cfg(), &[clip], &HashMap::new()).unwrap();
        let graph = ctx.graph.render();
        assert!(graph.contains("zoompan="));
        assert!(graph.contains("d=90"));
        assert!(graph.contains("s=1280x720"));
    }

    #[test]
    fn empty_track_builds_nothing() {
        let mut ctx = CompileContext::new();
        assert!(
            build_picture_track(&mut ctx, &cfg(), &[], &HashMap::new())
                .unwrap()
                .is_none()
        );
        assert!(ctx.graph.is_empty());
    }
}
