//! Gradient fill-image synthesis.
//!
//! Gradient color clips cannot be expressed with the lavfi `color` source,
//! so a PNG is generated once per clip, registered as a regular input, and
//! listed as a cleanup artifact.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    core::Canvas,
    error::{CinegraphError, CinegraphResult},
};

/// Parse `#rrggbb` hex or a small set of CSS-style names understood by
/// FFmpeg, so solid and gradient fills accept the same color syntax.
pub fn parse_color(s: &str) -> CinegraphResult<[u8; 3]> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 {
            return Err(CinegraphError::validation(format!(
                "hex color '{s}' must be #rrggbb"
            )));
        }
        let v = u32::from_str_radix(hex, 16)
            .map_err(|_| CinegraphError::validation(format!("invalid hex color '{s}'")))?;
        return Ok([(v >> 16) as u8, (v >> 8) as u8, v as u8]);
    }
    match s.to_ascii_lowercase().as_str() {
        "black" => Ok([0, 0, 0]),
        "white" => Ok([255, 255, 255]),
        "red" => Ok([255, 0, 0]),
        "green" => Ok([0, 128, 0]),
        "blue" => Ok([0, 0, 255]),
        "gray" | "grey" => Ok([128, 128, 128]),
        other => Err(CinegraphError::validation(format!(
            "unknown color name '{other}'"
        ))),
    }
}

/// Write a vertical two-stop gradient PNG at canvas size. The file name is
/// derived from the inputs so identical clips share one artifact.
pub fn write_gradient_png(
    dir: &Path,
    canvas: Canvas,
    from: &str,
    to: &str,
) -> CinegraphResult<PathBuf> {
    let top = parse_color(from)?;
    let bottom = parse_color(to)?;

    let path = dir.join(format!(
        "gradient-{:02x}{:02x}{:02x}-{:02x}{:02x}{:02x}-{}x{}.png",
        top[0], top[1], top[2], bottom[0], bottom[1], bottom[2], canvas.width, canvas.height
    ));
    if path.exists() {
        return Ok(path);
    }

    let mut img = image::RgbImage::new(canvas.width, canvas.height);
    let denom = (canvas.height.saturating_sub(1)).max(1) as f64;
    for (y, row) in img.enumerate_rows_mut() {
        let t = f64::from(y) / denom;
        let px = image::Rgb([
            lerp_u8(top[0], bottom[0], t),
            lerp_u8(top[1], bottom[1], t),
            lerp_u8(top[2], bottom[2], t),
        ]);
        for (_, _, p) in row {
            *p = px;
        }
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create temp dir '{}'", dir.display()))?;
    img.save(&path)
        .map_err(|e| CinegraphError::media(format!("failed to write gradient png: {e}")))?;
    Ok(path)
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_names_parse() {
        assert_eq!(parse_color("#ff8000").unwrap(), [255, 128, 0]);
        assert_eq!(parse_color("white").unwrap(), [255, 255, 255]);
        assert!(parse_color("#ff80").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn gradient_file_name_is_deterministic() {
        let dir = std::env::temp_dir().join(format!(
            "cinegraph_gradient_{}_{}",
            std::process::id(),
            line!()
        ));
        let canvas = Canvas {
            width: 64,
            height: 36,
        };
        let a = write_gradient_png(&dir, canvas, "#000000", "#ffffff").unwrap();
        let b = write_gradient_png(&dir, canvas, "#000000", "#ffffff").unwrap();
        assert_eq!(a, b);
        assert!(a.exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
