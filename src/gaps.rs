//! Picture-track gap analysis.
//!
//! A gap is a maximal interval of the nominal timeline with no picture
//! coverage. Without a fill policy any gap is fatal; with one, each gap is
//! resolved into a synthetic flat-color clip so the compiler never silently
//! drops time.

use crate::{
    core::{TIME_EPSILON, Timed, Window},
    error::{CinegraphError, CinegraphResult},
    model::{ColorClip, Fill, PictureClip},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gap {
    pub start: f64,
    pub end: f64,
}

impl Gap {
    pub fn duration(self) -> f64 {
        self.end - self.start
    }
}

/// Fill color applied to every detected gap.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    Solid { color: String },
    Gradient { from: String, to: String },
}

impl FillPolicy {
    fn as_fill(&self) -> Fill {
        match self {
            Self::Solid { color } => Fill::Solid {
                color: color.clone(),
            },
            Self::Gradient { from, to } => Fill::Gradient {
                from: from.clone(),
                to: to.clone(),
            },
        }
    }
}

/// Ordered gaps over the picture track, including a leading gap when the
/// first clip starts past `TIME_EPSILON` and a trailing gap against
/// `timeline_end` when supplied.
pub fn find_gaps(clips: &[PictureClip], timeline_end: Option<f64>) -> Vec<Gap> {
    let mut sorted: Vec<&PictureClip> = clips.iter().collect();
    sorted.sort_by(|a, b| a.position().total_cmp(&b.position()));

    let mut gaps = Vec::new();
    let mut cursor = 0.0f64;

    for clip in &sorted {
        if clip.position() - cursor > TIME_EPSILON {
            gaps.push(Gap {
                start: cursor,
                end: clip.position(),
            });
        }
        cursor = cursor.max(clip.end());
    }

    if let Some(end) = timeline_end
        && end - cursor > TIME_EPSILON
    {
        gaps.push(Gap {
            start: cursor,
            end,
        });
    }

    gaps
}

/// Pure transform: returns a new, position-ordered track with every gap
/// replaced by a synthetic color clip of exactly the gap's duration. The
/// caller's track is never mutated. With no fill policy and at least one
/// gap, this is a fatal timeline error.
pub fn fill_gaps(
    clips: &[PictureClip],
    timeline_end: Option<f64>,
    policy: Option<&FillPolicy>,
) -> CinegraphResult<Vec<PictureClip>> {
    let gaps = find_gaps(clips, timeline_end);

    let mut track: Vec<PictureClip> = clips.to_vec();
    track.sort_by(|a, b| a.position().total_cmp(&b.position()));

    if gaps.is_empty() {
        return Ok(track);
    }

    let Some(policy) = policy else {
        let g = gaps[0];
        return Err(CinegraphError::timeline(format!(
            "picture track has {} unfilled gap(s); first is [{:.3}, {:.3}) \
             ({:.3}s) and no fill policy is configured",
            gaps.len(),
            g.start,
            g.end,
            g.duration()
        )));
    };

    for gap in gaps {
        track.push(PictureClip::Color(ColorClip {
            window: Window::new(gap.start, gap.end)?,
            fill: policy.as_fill(),
            transition: None,
        }));
    }
    track.sort_by(|a, b| a.position().total_cmp(&b.position()));

    tracing::debug!(filled = track.len() - clips.len(), "gap-filled picture track");
    Ok(track)
}
