//! Cross-dissolve blending between aligned frames.
//!
//! The normalization pipeline leaves every frame on the same canvas, so a
//! downstream assembler can fade between consecutive frames by plain
//! weighted averaging. Only the blending math lives here; frame writing
//! and encoding stay with the assembler.

use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot blend {a_width}x{a_height} with {b_width}x{b_height}: dimensions differ")]
pub struct DimensionMismatch {
    pub a_width: u32,
    pub a_height: u32,
    pub b_width: u32,
    pub b_height: u32,
}

/// Per-pixel weighted average of two equally sized frames:
/// `(1 - alpha) * a + alpha * b`, with `alpha` clamped to `[0, 1]`.
pub fn cross_dissolve(
    a: &RgbImage,
    b: &RgbImage,
    alpha: f64,
) -> Result<RgbImage, DimensionMismatch> {
    if a.dimensions() != b.dimensions() {
        return Err(DimensionMismatch {
            a_width: a.width(),
            a_height: a.height(),
            b_width: b.width(),
            b_height: b.height(),
        });
    }

    let alpha = alpha.clamp(0.0, 1.0);
    let mut out = RgbImage::new(a.width(), a.height());
    for ((pa, pb), po) in a.pixels().zip(b.pixels()).zip(out.pixels_mut()) {
        for c in 0..3 {
            po[c] = ((1.0 - alpha) * f64::from(pa[c]) + alpha * f64::from(pb[c])).round() as u8;
        }
    }
    Ok(out)
}

/// The intermediate frames a cross-dissolve from `a` to `b` passes
/// through, at `alpha = j / steps` for `j = 1..=steps`. The final frame
/// equals `b`.
pub fn transition_frames(
    a: &RgbImage,
    b: &RgbImage,
    steps: u32,
) -> Result<Vec<RgbImage>, DimensionMismatch> {
    (1..=steps)
        .map(|j| cross_dissolve(a, b, f64::from(j) / f64::from(steps)))
        .collect()
}
