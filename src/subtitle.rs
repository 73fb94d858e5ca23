//! Subtitle-track document synthesis and caption import.
//!
//! Karaoke and free-form subtitle clips become one ASS document per clip;
//! imported SubRip/WebVTT files are parsed into the same cue representation
//! first. Cue times handed to this module are already expressed in visual
//! time; the ledger subtraction happens in the overlay builder.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    core::Canvas,
    error::{CinegraphError, CinegraphResult},
    gradient::parse_color,
    model::{Highlight, TextStyle},
};

#[derive(Clone, Debug, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KaraokeWord {
    pub text: String,
    /// Highlight duration, seconds.
    pub duration: f64,
}

/// Split a `[start, end)` window into `n` unit windows. Priority order:
/// explicit per-unit durations, explicit start timestamps, even subdivision.
/// Results are clamped to the window.
pub fn subdivide_window(
    start: f64,
    end: f64,
    n: usize,
    unit_durations: Option<&[f64]>,
    timestamps: Option<&[f64]>,
) -> Vec<(f64, f64)> {
    if n == 0 || end <= start {
        return Vec::new();
    }

    if let Some(durations) = unit_durations {
        let mut out = Vec::with_capacity(n);
        let mut cursor = start;
        for i in 0..n {
            let d = durations.get(i).copied().unwrap_or_else(|| {
                // Units beyond the provided list share the remainder evenly.
                ((end - cursor) / (n - i) as f64).max(0.0)
            });
            let unit_end = (cursor + d.max(0.0)).min(end);
            out.push((cursor.min(end), unit_end));
            cursor = unit_end;
        }
        return out;
    }

    if let Some(stamps) = timestamps {
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let s = stamps.get(i).copied().unwrap_or(end).clamp(start, end);
            let e = stamps.get(i + 1).copied().unwrap_or(end).clamp(s, end);
            out.push((s, e));
        }
        return out;
    }

    let step = (end - start) / n as f64;
    (0..n)
        .map(|i| (start + step * i as f64, start + step * (i + 1) as f64))
        .collect()
}

/// Distribute the words of `text` across `[start, end)`.
pub fn distribute_words(
    text: &str,
    start: f64,
    end: f64,
    unit_durations: Option<&[f64]>,
    timestamps: Option<&[f64]>,
) -> Vec<KaraokeWord> {
    let words: Vec<&str> = text.split_whitespace().collect();
    subdivide_window(start, end, words.len(), unit_durations, timestamps)
        .into_iter()
        .zip(words)
        .map(|((s, e), w)| KaraokeWord {
            text: w.to_string(),
            duration: e - s,
        })
        .collect()
}

/// Shift every cue by `offset` seconds, clamping starts at zero and
/// dropping cues that end up empty.
pub fn shift_cues(cues: &[Cue], offset: f64) -> Vec<Cue> {
    cues.iter()
        .filter_map(|c| {
            let start = (c.start + offset).max(0.0);
            let end = (c.end + offset).max(0.0);
            (end - start > 0.0).then(|| Cue {
                start,
                end,
                text: c.text.clone(),
            })
        })
        .collect()
}

// --- caption import -------------------------------------------------------

/// Parse `HH:MM:SS,mmm` (SubRip) or `[HH:]MM:SS.mmm` (WebVTT) timestamps.
fn parse_timestamp(s: &str) -> CinegraphResult<f64> {
    let s = s.trim().replace(',', ".");
    let parts: Vec<&str> = s.split(':').collect();
    let (h, m, rest) = match parts.as_slice() {
        [h, m, rest] => (
            h.parse::<f64>()
                .map_err(|_| CinegraphError::media(format!("bad timestamp '{s}'")))?,
            m.parse::<f64>()
                .map_err(|_| CinegraphError::media(format!("bad timestamp '{s}'")))?,
            *rest,
        ),
        [m, rest] => (
            0.0,
            m.parse::<f64>()
                .map_err(|_| CinegraphError::media(format!("bad timestamp '{s}'")))?,
            *rest,
        ),
        _ => return Err(CinegraphError::media(format!("bad timestamp '{s}'"))),
    };
    let secs = rest
        .parse::<f64>()
        .map_err(|_| CinegraphError::media(format!("bad timestamp '{s}'")))?;
    Ok(h * 3600.0 + m * 60.0 + secs)
}

fn parse_cue_blocks(content: &str) -> CinegraphResult<Vec<Cue>> {
    let normalized = content.replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty()).peekable();
        let Some(mut first) = lines.next() else {
            continue;
        };
        // SubRip numeric counters and WebVTT cue identifiers sit on the
        // line before the timing line.
        if !first.contains("-->") {
            match lines.next() {
                Some(l) if l.contains("-->") => first = l,
                _ => continue,
            }
        }

        let (from, to) = first
            .split_once("-->")
            .ok_or_else(|| CinegraphError::media(format!("bad cue timing line '{first}'")))?;
        // WebVTT allows cue settings after the end timestamp.
        let to = to.trim().split_whitespace().next().unwrap_or("");
        let start = parse_timestamp(from)?;
        let end = parse_timestamp(to)?;
        if end <= start {
            continue;
        }

        let text = lines.collect::<Vec<_>>().join("\n");
        if text.is_empty() {
            continue;
        }
        cues.push(Cue { start, end, text });
    }
    Ok(cues)
}

pub fn parse_srt(content: &str) -> CinegraphResult<Vec<Cue>> {
    parse_cue_blocks(content)
}

pub fn parse_vtt(content: &str) -> CinegraphResult<Vec<Cue>> {
    let body = content
        .trim_start_matches('\u{feff}')
        .strip_prefix("WEBVTT")
        .map(|rest| rest.split_once("\n\n").map(|(_, b)| b).unwrap_or(""))
        .unwrap_or(content);
    parse_cue_blocks(body)
}

/// Load an imported caption file, dispatching on extension.
pub fn load_cues(path: &Path) -> CinegraphResult<Vec<Cue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read caption file '{}'", path.display()))?;
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("srt") => parse_srt(&content),
        Some("vtt") => parse_vtt(&content),
        other => Err(CinegraphError::media(format!(
            "unsupported caption format '{}'",
            other.unwrap_or("?")
        ))),
    }
}

// --- ASS synthesis --------------------------------------------------------

fn ass_time(secs: f64) -> String {
    let total_cs = (secs.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_s = total_cs / 100;
    let s = total_s % 60;
    let m = (total_s / 60) % 60;
    let h = total_s / 3600;
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

fn ass_color(color: &str) -> CinegraphResult<String> {
    let [r, g, b] = parse_color(color)?;
    Ok(format!("&H00{b:02X}{g:02X}{r:02X}"))
}

fn ass_escape(text: &str) -> String {
    text.replace('{', "\\{").replace('}', "\\}").replace('\n', "\\N")
}

fn ass_header(canvas: Canvas, style: &TextStyle) -> CinegraphResult<String> {
    let primary = ass_color(&style.color)?;
    let outline = match &style.border_color {
        Some(c) => ass_color(c)?,
        None => "&H00000000".to_string(),
    };
    let font = style
        .font_file
        .as_ref()
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("Arial");
    Ok(format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX: {}\n\
         PlayResY: {}\n\
         WrapStyle: 0\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Default,{font},{},{primary},&H00808080,{outline},&H64000000,0,0,0,0,100,100,0,0,1,2,0,2,20,20,40,1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        canvas.width, canvas.height, style.size,
    ))
}

/// One karaoke dialogue line: each word tagged with an instant (`\k`) or
/// gradual (`\kf`) highlight directive in centiseconds.
pub fn karaoke_document(
    canvas: Canvas,
    style: &TextStyle,
    start: f64,
    end: f64,
    words: &[KaraokeWord],
    highlight: Highlight,
) -> CinegraphResult<String> {
    let mut doc = ass_header(canvas, style)?;
    let tag = match highlight {
        Highlight::Instant => "k",
        Highlight::Gradual => "kf",
    };
    let mut text = String::new();
    for (i, word) in words.iter().enumerate() {
        let centis = (word.duration * 100.0).round() as u64;
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&format!("{{\\{tag}{centis}}}{}", ass_escape(&word.text)));
    }
    doc.push_str(&format!(
        "Dialogue: 0,{},{},Default,,0,0,0,,{text}\n",
        ass_time(start),
        ass_time(end),
    ));
    Ok(doc)
}

/// Plain timed cues (imported captions, free-form styled text).
pub fn cue_document(canvas: Canvas, style: &TextStyle, cues: &[Cue]) -> CinegraphResult<String> {
    let mut doc = ass_header(canvas, style)?;
    for cue in cues {
        doc.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            ass_time(cue.start),
            ass_time(cue.end),
            ass_escape(&cue.text),
        ));
    }
    Ok(doc)
}

/// Write a subtitle document under `dir` with a deterministic name.
pub fn write_document(dir: &Path, stem: &str, contents: &str) -> CinegraphResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create temp dir '{}'", dir.display()))?;
    let path = dir.join(format!("{stem}.ass"));
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write subtitle file '{}'", path.display()))?;
    Ok(path)
}
