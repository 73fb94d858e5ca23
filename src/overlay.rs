//! Overlay compilation: text, watermark, effect, and subtitle clips become
//! chained, time-gated filter stages composed serially over the picture
//! stream. Every enable window and cue time is converted to visual time by
//! subtracting the transition overlap the ledger had accrued at the
//! overlay's nominal start.
//!
//! Escaping discipline: text containing characters unsafe for inline filter
//! syntax is routed to a written text file and consumed via `textfile=`;
//! the file receives the raw bytes, so recovering the original is the
//! identity read. Inline text therefore never needs a second escaping pass,
//! and the later shell-quoting layer must not add one.

use anyhow::Context as _;

use crate::{
    context::{CompileConfig, CompileContext},
    core::fmt_secs,
    error::CinegraphResult,
    graph::{Label, StreamKind},
    model::{
        AlphaEnvelope, Clip, Coord, EffectClip, EffectKind, Placement, SizeEnvelope,
        SubtitleClip, SubtitleContent, TextClip, TextMode, TextStyle, WatermarkAnchor,
        WatermarkClip,
    },
    subtitle,
};

/// Characters that may not appear in inline `text=` arguments: quotes,
/// the filter argument separator, and graph-level separators.
const INLINE_UNSAFE: &[char] = &['\'', '"', ':', ';', '[', ']', ',', '%', '\\', '\n'];

pub fn needs_text_file(text: &str) -> bool {
    text.contains(INLINE_UNSAFE)
}

/// How one piece of overlay text reaches drawtext.
#[derive(Clone, Debug, PartialEq)]
enum TextArg {
    Inline(String),
    File(std::path::PathBuf),
}

impl TextArg {
    fn render(&self) -> String {
        match self {
            Self::Inline(text) => format!("text='{text}'"),
            Self::File(path) => format!("textfile='{}'", escape_filter_path(path)),
        }
    }
}

fn route_text(ctx: &mut CompileContext, cfg: &CompileConfig, text: &str) -> CinegraphResult<TextArg> {
    if !needs_text_file(text) {
        return Ok(TextArg::Inline(text.to_string()));
    }
    let path = ctx.next_text_file(&cfg.temp_dir);
    std::fs::create_dir_all(&cfg.temp_dir)
        .with_context(|| format!("failed to create temp dir '{}'", cfg.temp_dir.display()))?;
    // Raw bytes: de-escaping is the identity, and nothing downstream may
    // re-escape what this routing already made safe.
    std::fs::write(&path, text)
        .with_context(|| format!("failed to write text file '{}'", path.display()))?;
    ctx.add_artifact(path.clone());
    Ok(TextArg::File(path))
}

/// Escape a path for use inside a quoted filter argument.
fn escape_filter_path(path: &std::path::Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

// --- placement and envelopes ---------------------------------------------

fn coord_expr(coord: Coord, axis_len: &str, text_len: &str) -> String {
    match coord {
        Coord::Center => format!("({axis_len}-{text_len})/2"),
        Coord::Percent(p) => format!("({axis_len}*{:.4}-{text_len}/2)", p / 100.0),
        Coord::Px(px) => format!("{px}"),
    }
}

fn placement_exprs(placement: Placement) -> (String, String) {
    (
        coord_expr(placement.x, "w", "text_w"),
        coord_expr(placement.y, "h", "text_h"),
    )
}

/// Piecewise-linear alpha over the visual window `[start, end)`.
fn alpha_expr(env: &AlphaEnvelope, start: f64, end: f64) -> String {
    let (s, e) = (fmt_secs(start), fmt_secs(end));
    match env {
        AlphaEnvelope::FadeIn { duration } => {
            let d = fmt_secs(*duration);
            format!("clip((t-{s})/{d},0,1)")
        }
        AlphaEnvelope::FadeOut { duration } => {
            let d = fmt_secs(*duration);
            format!("clip(({e}-t)/{d},0,1)")
        }
        AlphaEnvelope::FadeInOut { fade_in, fade_out } => {
            let di = fmt_secs(*fade_in);
            let dout = fmt_secs(*fade_out);
            format!("clip(min((t-{s})/{di},({e}-t)/{dout}),0,1)")
        }
    }
}

/// Closed-form size multiplier at `u` seconds into the unit window.
/// Mirrors [`size_expr`]; tests pin both to the same curve shapes.
pub fn size_scale_at(env: SizeEnvelope, u: f64) -> f64 {
    let u = u.max(0.0);
    match env {
        SizeEnvelope::ScaleIn => (u / 0.3).min(1.0),
        SizeEnvelope::Pop => {
            if u < 0.2 {
                1.2 * u / 0.2
            } else if u < 0.35 {
                1.2 - 0.2 * (u - 0.2) / 0.15
            } else {
                1.0
            }
        }
        SizeEnvelope::BouncePop => 1.0 - (-6.0 * u).exp() * (10.0 * u).cos(),
        SizeEnvelope::Pulse => 1.0 + 0.08 * (2.0 * std::f64::consts::PI * 1.5 * u).sin(),
    }
}

fn size_expr(env: SizeEnvelope, base: u32, start: f64) -> String {
    let s = fmt_secs(start);
    let u = format!("(t-{s})");
    let scale = match env {
        SizeEnvelope::ScaleIn => format!("min({u}/0.3,1)"),
        SizeEnvelope::Pop => format!(
            "if(lt({u},0.2),1.2*{u}/0.2,if(lt({u},0.35),1.2-0.2*({u}-0.2)/0.15,1))"
        ),
        SizeEnvelope::BouncePop => format!("(1-exp(-6*{u})*cos(10*{u}))"),
        SizeEnvelope::Pulse => format!("(1+0.08*sin(2*PI*1.5*{u}))"),
    };
    format!("{base}*{scale}")
}

// --- drawtext synthesis ---------------------------------------------------

struct TextUnit {
    text: String,
    /// Nominal timeline window.
    start: f64,
    end: f64,
}

fn expand_text_units(clip: &TextClip) -> Vec<TextUnit> {
    let (start, end) = (clip.window.position, clip.window.end);
    let durations = clip.unit_durations.as_deref();
    let stamps = clip.timestamps.as_deref();

    match clip.mode {
        TextMode::Static => vec![TextUnit {
            text: clip.text.clone(),
            start,
            end,
        }],
        TextMode::WordReplace | TextMode::WordSequential => {
            let words: Vec<&str> = clip.text.split_whitespace().collect();
            let windows = subtitle::subdivide_window(start, end, words.len(), durations, stamps);
            windows
                .into_iter()
                .enumerate()
                .map(|(i, (s, e))| TextUnit {
                    text: if clip.mode == TextMode::WordReplace {
                        words[i].to_string()
                    } else {
                        words[..=i].join(" ")
                    },
                    start: s,
                    end: e,
                })
                .collect()
        }
        TextMode::CharReveal => {
            let chars: Vec<char> = clip.text.chars().collect();
            let windows = subtitle::subdivide_window(start, end, chars.len(), durations, stamps);
            windows
                .into_iter()
                .enumerate()
                .map(|(i, (s, _))| TextUnit {
                    text: chars[..=i].iter().collect(),
                    start: s,
                    end,
                })
                .collect()
        }
    }
}

fn drawtext_filter(
    style: &TextStyle,
    placement: Placement,
    text: &TextArg,
    visual_start: f64,
    visual_end: f64,
    alpha: Option<&AlphaEnvelope>,
    size_fx: Option<SizeEnvelope>,
) -> String {
    let (x, y) = placement_exprs(placement);
    let mut args = Vec::new();

    match size_fx {
        Some(env) => args.push(format!(
            "fontsize='{}'",
            size_expr(env, style.size, visual_start)
        )),
        None => args.push(format!("fontsize={}", style.size)),
    }
    args.push(format!("fontcolor={}", style.color));
    if let Some(font) = &style.font_file {
        args.push(format!("fontfile='{}'", escape_filter_path(font)));
    }
    if let Some(border) = &style.border_color {
        args.push(format!("bordercolor={border}"));
        args.push("borderw=2".to_string());
    }
    args.push(format!("x='{x}'"));
    args.push(format!("y='{y}'"));
    if let Some(env) = alpha {
        args.push(format!("alpha='{}'", alpha_expr(env, visual_start, visual_end)));
    }
    args.push(text.render());
    args.push(format!(
        "enable='between(t,{},{})'",
        fmt_secs(visual_start),
        fmt_secs(visual_end)
    ));

    format!("drawtext={}", args.join(":"))
}

fn apply_text_clip(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    mut current: Label,
    clip: &TextClip,
) -> CinegraphResult<Label> {
    let offset = ctx.ledger.offset_at(clip.window.position);
    for unit in expand_text_units(clip) {
        let visual_start = (unit.start - offset).max(0.0);
        let visual_end = (unit.end - offset).max(visual_start);
        let text = route_text(ctx, cfg, &unit.text)?;
        let filter = drawtext_filter(
            &clip.style,
            clip.placement,
            &text,
            visual_start,
            visual_end,
            clip.alpha.as_ref(),
            clip.size_fx,
        );
        current = ctx.graph.chain(current, filter, "v");
    }
    Ok(current)
}

// --- effects, watermarks, subtitles ---------------------------------------

fn effect_filter(kind: &EffectKind) -> String {
    match kind {
        EffectKind::Grayscale => "hue=s=0".to_string(),
        EffectKind::Sepia => "colorchannelmixer=\
            .393:.769:.189:0:.349:.686:.168:0:.272:.534:.131"
            .to_string(),
        EffectKind::Blur { radius } => format!("gblur=sigma={radius}"),
        EffectKind::Vignette => "vignette".to_string(),
    }
}

fn apply_effect_clip(ctx: &mut CompileContext, current: Label, clip: &EffectClip) -> Label {
    let offset = ctx.ledger.offset_at(clip.window.position);
    let start = (clip.window.position - offset).max(0.0);
    let end = (clip.window.end - offset).max(start);
    let base = effect_filter(&clip.effect);
    let sep = if base.contains('=') { ':' } else { '=' };
    let filter = format!(
        "{base}{sep}enable='between(t,{},{})'",
        fmt_secs(start),
        fmt_secs(end)
    );
    ctx.graph.chain(current, filter, "v")
}

fn watermark_coords(anchor: WatermarkAnchor, margin: u32) -> (String, String) {
    match anchor {
        WatermarkAnchor::TopLeft => (format!("{margin}"), format!("{margin}")),
        WatermarkAnchor::TopRight => (format!("W-w-{margin}"), format!("{margin}")),
        WatermarkAnchor::BottomLeft => (format!("{margin}"), format!("H-h-{margin}")),
        WatermarkAnchor::BottomRight => (format!("W-w-{margin}"), format!("H-h-{margin}")),
        WatermarkAnchor::Center => ("(W-w)/2".to_string(), "(H-h)/2".to_string()),
    }
}

fn apply_watermark_clip(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    current: Label,
    clip: &WatermarkClip,
) -> CinegraphResult<Label> {
    let input = ctx.add_input(&clip.source);
    let src = Label::Source {
        input,
        kind: StreamKind::Video,
    };
    let width = ((f64::from(cfg.width) * clip.scale).round() as u32).max(2);
    let prepared = ctx.graph.chain(
        src,
        format!(
            "scale={width}:-1,format=rgba,colorchannelmixer=aa={:.4}",
            clip.opacity.clamp(0.0, 1.0)
        ),
        "wm",
    );

    let (x, y) = watermark_coords(clip.anchor, clip.margin_px);
    let mut filter = format!("overlay={x}:{y}");
    if let Some(window) = clip.window {
        let offset = ctx.ledger.offset_at(window.position);
        let start = (window.position - offset).max(0.0);
        let end = (window.end - offset).max(start);
        filter.push_str(&format!(
            ":enable='between(t,{},{})'",
            fmt_secs(start),
            fmt_secs(end)
        ));
    }

    let out = ctx.graph.alloc("v");
    ctx.graph.add(vec![current, prepared], filter, vec![out.clone()]);
    Ok(out)
}

fn apply_subtitle_clip(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    current: Label,
    clip: &SubtitleClip,
) -> CinegraphResult<Label> {
    let canvas = cfg.canvas();
    let offset = ctx.ledger.offset_at(clip.window.position);
    let visual_start = (clip.window.position - offset).max(0.0);
    let visual_end = (clip.window.end - offset).max(visual_start);

    let doc = match &clip.content {
        SubtitleContent::Karaoke {
            text,
            highlight,
            unit_durations,
            timestamps,
        } => {
            // Distribute on the nominal window, then place the single cue
            // in visual time; the per-word durations are unaffected by the
            // shift.
            let words = subtitle::distribute_words(
                text,
                clip.window.position,
                clip.window.end,
                unit_durations.as_deref(),
                timestamps.as_deref(),
            );
            subtitle::karaoke_document(
                canvas,
                &clip.style,
                visual_start,
                visual_end,
                &words,
                *highlight,
            )?
        }
        SubtitleContent::Text { text } => {
            let cues = [subtitle::Cue {
                start: visual_start,
                end: visual_end,
                text: text.clone(),
            }];
            subtitle::cue_document(canvas, &clip.style, &cues)?
        }
        SubtitleContent::File { path, offset: file_offset } => {
            let loaded = subtitle::load_cues(path)?;
            let shifted = subtitle::shift_cues(&loaded, *file_offset);
            // Clamp into the clip window, then move into visual time.
            let cues: Vec<subtitle::Cue> = shifted
                .into_iter()
                .filter_map(|c| {
                    let start = c.start.max(clip.window.position);
                    let end = c.end.min(clip.window.end);
                    if end <= start {
                        return None;
                    }
                    let visual_start = (start - offset).max(0.0);
                    Some(subtitle::Cue {
                        start: visual_start,
                        end: (end - offset).max(visual_start),
                        text: c.text,
                    })
                })
                .collect();
            subtitle::cue_document(canvas, &clip.style, &cues)?
        }
    };

    let stem = ctx.next_subtitle_stem();
    let path = subtitle::write_document(&cfg.temp_dir, &stem, &doc)?;
    ctx.add_artifact(path.clone());
    let filter = format!("subtitles=filename='{}'", escape_filter_path(&path));
    Ok(ctx.graph.chain(current, filter, "v"))
}

/// Whether a clip is handled by the overlay builder.
pub fn is_overlay(clip: &Clip) -> bool {
    matches!(
        clip,
        Clip::Text(_) | Clip::Subtitle(_) | Clip::Effect(_) | Clip::Watermark(_)
    )
}

/// Compose overlay clips serially over `base`, in declared order within
/// each layer: effects first, then text, then subtitles, watermarks on top.
pub fn apply_overlays(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    base: Label,
    overlays: &[&Clip],
) -> CinegraphResult<Label> {
    let mut current = base;

    for clip in overlays {
        if let Clip::Effect(c) = clip {
            current = apply_effect_clip(ctx, current, c);
        }
    }
    for clip in overlays {
        if let Clip::Text(c) = clip {
            current = apply_text_clip(ctx, cfg, current, c)?;
        }
    }
    for clip in overlays {
        if let Clip::Subtitle(c) = clip {
            current = apply_subtitle_clip(ctx, cfg, current, c)?;
        }
    }
    for clip in overlays {
        if let Clip::Watermark(c) = clip {
            current = apply_watermark_clip(ctx, cfg, current, c)?;
        }
    }

    Ok(current)
}
