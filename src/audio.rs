//! Audio track assembly.
//!
//! Every sound-bearing clip is trimmed, volume-scaled, resampled to the
//! shared mix rate, and delayed to its position expressed in visual time:
//! the nominal position minus the transition overlap the picture track had
//! accrued at that instant (the ledger). Background music is looped and
//! mixed in a separate, later stage so per-clip mixing never attenuates it.

use std::{collections::HashMap, path::PathBuf};

use crate::{
    context::{CompileConfig, CompileContext},
    core::{TIME_EPSILON, fmt_secs, millis},
    error::CinegraphResult,
    graph::{Label, StreamKind},
    model::Clip,
    probe::MediaInfo,
};

/// Sample rate every contributor is resampled to before mixing.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

struct SoundSource {
    source: PathBuf,
    position: f64,
    duration: f64,
    source_start: f64,
    volume: f64,
}

fn sound_sources(clips: &[Clip], media: &HashMap<PathBuf, MediaInfo>) -> Vec<SoundSource> {
    let mut out = Vec::new();
    for clip in clips {
        match clip {
            Clip::Video(c) => {
                if c.muted {
                    continue;
                }
                let has_audio = media.get(&c.source).map(|i| i.has_audio).unwrap_or(false);
                if !has_audio {
                    continue;
                }
                out.push(SoundSource {
                    source: c.source.clone(),
                    position: c.window.position,
                    duration: c.window.duration(),
                    source_start: c.source_start,
                    volume: c.volume,
                });
            }
            Clip::Audio(c) => out.push(SoundSource {
                source: c.source.clone(),
                position: c.window.position,
                duration: c.window.duration(),
                source_start: c.source_start,
                volume: c.volume,
            }),
            _ => {}
        }
    }
    out.sort_by(|a, b| a.position.total_cmp(&b.position));
    out
}

fn clamp_to_source(
    src: &SoundSource,
    media: &HashMap<PathBuf, MediaInfo>,
) -> f64 {
    let Some(info) = media.get(&src.source) else {
        return src.duration;
    };
    if info.duration_sec <= 0.0 {
        return src.duration;
    }
    let available = (info.duration_sec - src.source_start).max(0.0);
    if src.duration > available + TIME_EPSILON {
        tracing::warn!(
            source = %src.source.display(),
            requested = src.duration,
            available,
            "audio clip requests more source duration than available; clamping"
        );
        available
    } else {
        src.duration
    }
}

/// Build the mixed audio output. Returns `None` when nothing makes sound.
pub fn build_audio_track(
    ctx: &mut CompileContext,
    cfg: &CompileConfig,
    clips: &[Clip],
    total_duration: f64,
    media: &HashMap<PathBuf, MediaInfo>,
) -> CinegraphResult<Option<Label>> {
    let sources = sound_sources(clips, media);

    let mut per_clip = Vec::new();
    for src in &sources {
        let duration = clamp_to_source(src, media);
        if duration <= TIME_EPSILON {
            continue;
        }
        let input = ctx.add_input(&src.source);
        let stream = Label::Source {
            input,
            kind: StreamKind::Audio,
        };

        let offset = ctx.ledger.offset_at(src.position);
        let delay_ms = millis(src.position - offset).max(0);

        let filter = format!(
            "atrim=start={}:end={},asetpts=PTS-STARTPTS,volume={},\
             aresample={MIX_SAMPLE_RATE},adelay={delay_ms}:all=1",
            fmt_secs(src.source_start),
            fmt_secs(src.source_start + duration),
            src.volume,
        );
        per_clip.push(ctx.graph.chain(stream, filter, "a"));
    }

    let main_mix = match per_clip.len() {
        0 => None,
        1 => per_clip.pop(),
        n => {
            let out = ctx.graph.alloc("a");
            ctx.graph.add(
                per_clip,
                format!("amix=inputs={n}:duration=longest"),
                vec![out.clone()],
            );
            Some(out)
        }
    };

    // Background music: looped to the export length, mixed after the
    // per-clip stage so the clip count never scales it down.
    let mut music = Vec::new();
    for clip in clips {
        let Clip::Music(c) = clip else { continue };
        let input = ctx.add_input(&c.source);
        let stream = Label::Source {
            input,
            kind: StreamKind::Audio,
        };
        let filter = format!(
            "atrim=start={},asetpts=PTS-STARTPTS,aloop=loop=-1:size=2147483647,\
             atrim=end={},asetpts=PTS-STARTPTS,volume={},aresample={MIX_SAMPLE_RATE}",
            fmt_secs(c.source_start),
            fmt_secs(total_duration),
            c.volume,
        );
        music.push(ctx.graph.chain(stream, filter, "a"));
    }

    let out = match (main_mix, music.len()) {
        (None, 0) => None,
        (Some(main), 0) => Some(main),
        (None, 1) => music.pop(),
        (None, n) => {
            let out = ctx.graph.alloc("a");
            ctx.graph.add(
                music,
                format!("amix=inputs={n}:duration=longest"),
                vec![out.clone()],
            );
            Some(out)
        }
        (Some(main), n) => {
            let out = ctx.graph.alloc("a");
            let mut inputs = vec![main];
            inputs.extend(music);
            // duration=first: music never extends the export.
            ctx.graph.add(
                inputs,
                format!("amix=inputs={}:duration=first", n + 1),
                vec![out.clone()],
            );
            Some(out)
        }
    };

    Ok(out)
}
