use crate::error::{CinegraphError, CinegraphResult};

/// Positions within this tolerance of each other are treated as touching.
/// Absorbs floating-point jitter from upstream duration arithmetic.
pub const TIME_EPSILON: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> CinegraphResult<Self> {
        if width == 0 || height == 0 {
            return Err(CinegraphError::validation(
                "canvas width/height must be > 0",
            ));
        }
        Ok(Self { width, height })
    }

    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Half-open window `[position, end)` on the nominal timeline, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Window {
    pub position: f64,
    pub end: f64,
}

impl Window {
    pub fn new(position: f64, end: f64) -> CinegraphResult<Self> {
        if !position.is_finite() || !end.is_finite() {
            return Err(CinegraphError::validation("window times must be finite"));
        }
        if end <= position {
            return Err(CinegraphError::validation(format!(
                "window end ({end}) must be after position ({position})"
            )));
        }
        Ok(Self { position, end })
    }

    pub fn from_duration(position: f64, duration: f64) -> CinegraphResult<Self> {
        Self::new(position, position + duration)
    }

    pub fn duration(self) -> f64 {
        self.end - self.position
    }
}

/// Anything placed on the nominal timeline.
pub trait Timed {
    fn window(&self) -> Window;

    fn position(&self) -> f64 {
        self.window().position
    }

    fn end(&self) -> f64 {
        self.window().end
    }

    fn duration(&self) -> f64 {
        self.window().duration()
    }
}

/// Format seconds for filter arguments: fixed precision, no scientific
/// notation, so identical inputs serialize identically.
pub fn fmt_secs(v: f64) -> String {
    format!("{v:.4}")
}

/// Milliseconds for `adelay`, rounded to the nearest integer.
pub fn millis(v: f64) -> i64 {
    (v * 1000.0).round() as i64
}
