//! Export planning: probe, assemble the picture and audio tracks, apply
//! overlays, and emit one or more render passes.
//!
//! A pass is a complete `filter_complex` invocation. Most exports fit in a
//! single pass; when the overlay count exceeds the configured batch size the
//! plan splits overlays across strictly sequential passes, each re-encoding
//! the previous pass's temporary output. The plan is deterministic: the same
//! clips and config always produce byte-identical graphs.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    audio::build_audio_track,
    context::{CompileConfig, CompileContext},
    core::TIME_EPSILON,
    error::{CinegraphError, CinegraphResult},
    gaps::fill_gaps,
    graph::{Label, StreamKind},
    model::Clip,
    overlay::{apply_overlays, is_overlay},
    picture::build_picture_track,
    probe::{MediaInfo, MediaProber},
};

/// One FFmpeg invocation of the plan.
#[derive(Debug)]
pub struct RenderPass {
    /// `-i` inputs, in index order.
    pub inputs: Vec<PathBuf>,
    /// The rendered `filter_complex` string.
    pub filter_graph: String,
    /// Final video label to `-map`, including brackets.
    pub video_label: Option<String>,
    /// Final audio label to `-map`. Absent on follow-up passes, which copy
    /// the audio already muxed into the previous pass's output.
    pub audio_label: Option<String>,
    /// Where this pass writes: a temporary for intermediate passes, the
    /// requested destination for the last.
    pub output: PathBuf,
}

/// Everything the process runner needs to execute an export.
#[derive(Debug)]
pub struct ExportPlan {
    pub passes: Vec<RenderPass>,
    /// Final duration in seconds, after transition compression.
    pub total_duration: f64,
    /// Generated files to delete once the export finishes.
    pub artifacts: Vec<PathBuf>,
}

fn probe_sources(
    clips: &[Clip],
    prober: &dyn MediaProber,
) -> CinegraphResult<HashMap<PathBuf, MediaInfo>> {
    let mut media = HashMap::new();
    for clip in clips {
        let path = match clip {
            Clip::Video(c) => &c.source,
            Clip::Image(c) => &c.source,
            Clip::Audio(c) => &c.source,
            Clip::Music(c) => &c.source,
            _ => continue,
        };
        if media.contains_key(path) {
            continue;
        }
        let info = prober.probe(path)?;
        media.insert(path.clone(), info);
    }
    Ok(media)
}

/// Latest nominal end across windowed clips, for exports without picture.
fn nominal_end(clips: &[Clip]) -> f64 {
    clips
        .iter()
        .filter_map(|clip| match clip {
            Clip::Video(c) => Some(c.window.end),
            Clip::Image(c) => Some(c.window.end),
            Clip::Color(c) => Some(c.window.end),
            Clip::Audio(c) => Some(c.window.end),
            Clip::Text(c) => Some(c.window.end),
            Clip::Subtitle(c) => Some(c.window.end),
            Clip::Effect(c) => Some(c.window.end),
            Clip::Watermark(c) => c.window.map(|w| w.end),
            Clip::Music(_) => None,
        })
        .fold(0.0, f64::max)
}

fn finish_pass(
    mut ctx: CompileContext,
    video: Option<&Label>,
    audio: Option<&Label>,
    output: PathBuf,
    artifacts: &mut Vec<PathBuf>,
) -> CinegraphResult<RenderPass> {
    let finals: Vec<&Label> = video.into_iter().chain(audio).collect();
    ctx.graph.validate(&finals)?;
    let pass = RenderPass {
        inputs: ctx.inputs().to_vec(),
        filter_graph: ctx.graph.render(),
        video_label: video.map(Label::render),
        audio_label: audio.map(Label::render),
        output,
    };
    artifacts.extend(ctx.take_artifacts());
    Ok(pass)
}

/// Compile a clip list into an executable export plan.
#[tracing::instrument(skip_all, fields(clips = clips.len(), output = %output.display()))]
pub fn compile(
    cfg: &CompileConfig,
    clips: &[Clip],
    output: &Path,
    prober: &dyn MediaProber,
) -> CinegraphResult<ExportPlan> {
    cfg.validate()?;
    if clips.is_empty() {
        return Err(CinegraphError::timeline("clip list is empty"));
    }

    let media = probe_sources(clips, prober)?;

    let picture_clips: Vec<_> = clips.iter().filter_map(Clip::as_picture).collect();
    let picture_clips = fill_gaps(&picture_clips, cfg.timeline_end, cfg.fill.as_ref())?;
    let overlays: Vec<&Clip> = clips.iter().filter(|c| is_overlay(c)).collect();

    let mut artifacts = Vec::new();
    let mut ctx = CompileContext::new();

    let picture = build_picture_track(&mut ctx, cfg, &picture_clips, &media)?;
    let total_duration = match &picture {
        Some(p) => p.duration,
        // Audio-only export: nothing compresses the timeline.
        None => {
            let mut end = cfg.timeline_end.unwrap_or_else(|| nominal_end(clips));
            if end <= TIME_EPSILON {
                // Music carries no window; its probed length defines a
                // music-only export.
                end = clips
                    .iter()
                    .filter_map(|c| match c {
                        Clip::Music(m) => media
                            .get(&m.source)
                            .map(|i| (i.duration_sec - m.source_start).max(0.0)),
                        _ => None,
                    })
                    .fold(0.0, f64::max);
            }
            if end <= TIME_EPSILON {
                return Err(CinegraphError::timeline(
                    "export duration resolves to zero",
                ));
            }
            end
        }
    };

    let audio = build_audio_track(&mut ctx, cfg, clips, total_duration, &media)?;

    if picture.is_none() && audio.is_none() {
        return Err(CinegraphError::timeline(
            "no clip produces picture or sound",
        ));
    }
    if picture.is_none() && !overlays.is_empty() {
        tracing::warn!(
            count = overlays.len(),
            "overlays dropped: no picture track to compose over"
        );
    }

    let batch = cfg.overlay_batch_size;
    let mut passes = Vec::new();

    match picture {
        None => {
            let pass = finish_pass(ctx, None, audio.as_ref(), output.to_path_buf(), &mut artifacts)?;
            passes.push(pass);
        }
        Some(picture) => {
            let chunks: Vec<&[&Clip]> = overlays.chunks(batch).collect();
            let multi = chunks.len() > 1;

            // First pass carries picture, audio, and the first overlay batch.
            let first_chunk = chunks.first().copied().unwrap_or(&[]);
            let video = apply_overlays(&mut ctx, cfg, picture.label, first_chunk)?;
            let first_out = if multi {
                let tmp = cfg.temp_dir.join("pass-0.mp4");
                artifacts.push(tmp.clone());
                tmp
            } else {
                output.to_path_buf()
            };
            // Seeded before the context is consumed; carries the ledger
            // and artifact name counters into the next pass.
            let mut carry = ctx.next_pass();
            passes.push(finish_pass(
                ctx,
                Some(&video),
                audio.as_ref(),
                first_out,
                &mut artifacts,
            )?);

            // Follow-up passes re-encode the previous output with the next
            // batch; their enable windows still come from the same ledger.
            for (i, chunk) in chunks.iter().enumerate().skip(1) {
                let mut pass_ctx = carry;
                let prev = &passes[i - 1].output;
                let input = pass_ctx.add_input(prev);
                let base = Label::Source {
                    input,
                    kind: StreamKind::Video,
                };
                let video = apply_overlays(&mut pass_ctx, cfg, base, chunk)?;
                carry = pass_ctx.next_pass();
                let pass_out = if i + 1 < chunks.len() {
                    let tmp = cfg.temp_dir.join(format!("pass-{i}.mp4"));
                    artifacts.push(tmp.clone());
                    tmp
                } else {
                    output.to_path_buf()
                };
                passes.push(finish_pass(
                    pass_ctx,
                    Some(&video),
                    None,
                    pass_out,
                    &mut artifacts,
                )?);
            }
        }
    }

    tracing::debug!(
        passes = passes.len(),
        total_duration,
        artifacts = artifacts.len(),
        "export plan ready"
    );
    Ok(ExportPlan {
        passes,
        total_duration,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::Window,
        model::{AudioClip, ColorClip, Fill, MusicClip, Placement, TextClip, TextStyle},
        probe::StubProber,
    };

    fn cfg() -> CompileConfig {
        let mut cfg = CompileConfig::new(1280, 720, 30);
        cfg.temp_dir = std::env::temp_dir().join(format!("cinegraph_asm_{}", std::process::id()));
        cfg
    }

    fn color(position: f64, end: f64) -> Clip {
        Clip::Color(ColorClip {
            window: Window::new(position, end).unwrap(),
            fill: Fill::Solid {
                color: "black".to_string(),
            },
            transition: None,
        })
    }

    fn text(label: &str, position: f64, end: f64) -> Clip {
        Clip::Text(TextClip {
            text: label.to_string(),
            window: Window::new(position, end).unwrap(),
            mode: Default::default(),
            style: TextStyle::default(),
            placement: Placement::default(),
            alpha: None,
            size_fx: None,
            unit_durations: None,
            timestamps: None,
        })
    }

    #[test]
    fn empty_timeline_is_rejected() {
        let err = compile(&cfg(), &[], Path::new("out.mp4"), &StubProber::default());
        assert!(err.is_err());
    }

    #[test]
    fn single_pass_plan_maps_video_and_audio() {
        let clips = vec![
            color(0.0, 4.0),
            Clip::Audio(AudioClip {
                source: "tone.wav".into(),
                window: Window::new(0.0, 4.0).unwrap(),
                source_start: 0.0,
                volume: 1.0,
            }),
        ];
        let plan = compile(&cfg(), &clips, Path::new("out.mp4"), &StubProber::default()).unwrap();
        assert_eq!(plan.passes.len(), 1);
        let pass = &plan.passes[0];
        assert!(pass.video_label.is_some());
        assert!(pass.audio_label.is_some());
        assert_eq!(pass.output, Path::new("out.mp4"));
        assert!((plan.total_duration - 4.0).abs() < 1e-9);
    }

    #[test]
    fn audio_only_export_degrades_gracefully() {
        let clips = vec![Clip::Audio(AudioClip {
            source: "tone.wav".into(),
            window: Window::new(0.0, 3.0).unwrap(),
            source_start: 0.0,
            volume: 1.0,
        })];
        let plan = compile(&cfg(), &clips, Path::new("out.m4a"), &StubProber::default()).unwrap();
        assert_eq!(plan.passes.len(), 1);
        assert!(plan.passes[0].video_label.is_none());
        assert!(plan.passes[0].audio_label.is_some());
        assert!((plan.total_duration - 3.0).abs() < 1e-9);
    }

    #[test]
    fn overlays_beyond_the_batch_split_into_sequential_passes() {
        let mut cfg = cfg();
        cfg.overlay_batch_size = 2;
        let clips = vec![
            color(0.0, 10.0),
            text("one", 0.0, 2.0),
            text("two", 2.0, 4.0),
            text("three", 4.0, 6.0),
        ];
        let plan = compile(&cfg, &clips, Path::new("out.mp4"), &StubProber::default()).unwrap();
        assert_eq!(plan.passes.len(), 2);

        // Pass 2 reads pass 1's temporary and writes the destination.
        let tmp = &plan.passes[0].output;
        assert_ne!(tmp, Path::new("out.mp4"));
        assert_eq!(plan.passes[1].inputs[0], *tmp);
        assert_eq!(plan.passes[1].output, Path::new("out.mp4"));
        assert!(plan.passes[1].audio_label.is_none());
        assert!(plan.artifacts.contains(tmp));
    }

    #[test]
    fn routed_text_files_never_collide_across_passes() {
        let mut cfg = cfg();
        cfg.overlay_batch_size = 1;
        cfg.temp_dir = std::env::temp_dir().join(format!(
            "cinegraph_asm_passes_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&cfg.temp_dir);

        // Colons force both texts through file routing.
        let clips = vec![
            color(0.0, 10.0),
            text("first: pass one text", 0.0, 4.0),
            text("second: pass two text", 4.0, 8.0),
        ];
        let plan = compile(&cfg, &clips, Path::new("out.mp4"), &StubProber::default()).unwrap();
        assert_eq!(plan.passes.len(), 2);

        let texts: Vec<_> = plan
            .artifacts
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e == "txt"))
            .collect();
        assert_eq!(texts.len(), 2);
        assert_ne!(texts[0], texts[1]);
        assert_eq!(
            std::fs::read_to_string(texts[0]).unwrap(),
            "first: pass one text"
        );
        assert_eq!(
            std::fs::read_to_string(texts[1]).unwrap(),
            "second: pass two text"
        );

        std::fs::remove_dir_all(&cfg.temp_dir).unwrap();
    }

    #[test]
    fn music_only_export_runs_for_the_probed_source_length() {
        let clips = vec![Clip::Music(MusicClip {
            source: "bed.mp3".into(),
            source_start: 10.0,
            volume: 0.5,
        })];
        // StubProber reports 60s for unregistered media.
        let plan = compile(&cfg(), &clips, Path::new("out.m4a"), &StubProber::default()).unwrap();
        assert!((plan.total_duration - 50.0).abs() < 1e-9);
        assert!(plan.passes[0].filter_graph.contains("atrim=end=50.0000"));
    }

    #[test]
    fn zero_length_music_only_export_is_rejected() {
        let mut prober = StubProber::default();
        prober.media.insert(
            PathBuf::from("bed.mp3"),
            MediaInfo {
                duration_sec: 0.0,
                width: 0,
                height: 0,
                rotation_deg: 0,
                has_audio: true,
                sample_rate: 44_100,
            },
        );
        let clips = vec![Clip::Music(MusicClip {
            source: "bed.mp3".into(),
            source_start: 0.0,
            volume: 1.0,
        })];
        let err = compile(&cfg(), &clips, Path::new("out.m4a"), &prober);
        assert!(err.is_err());
    }

    #[test]
    fn identical_input_compiles_to_identical_graphs() {
        let clips = vec![color(0.0, 5.0), text("hello", 1.0, 3.0)];
        let a = compile(&cfg(), &clips, Path::new("out.mp4"), &StubProber::default()).unwrap();
        let b = compile(&cfg(), &clips, Path::new("out.mp4"), &StubProber::default()).unwrap();
        assert_eq!(a.passes[0].filter_graph, b.passes[0].filter_graph);
        assert_eq!(a.passes[0].video_label, b.passes[0].video_label);
    }
}
