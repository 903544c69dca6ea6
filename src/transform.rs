//! Pixel-level application of affine transforms.
//!
//! Warping is done by inverse mapping: each output pixel is pulled from
//! the source through the inverted transform with bilinear sampling. The
//! canvas never grows; every stage produces an image of the same
//! dimensions as its input.

use image::{imageops, Rgb, RgbImage};
use nalgebra::{Matrix3, Point2};

use crate::error::FrameError;
use crate::geometry::transform_point;

/// How a warp fills output pixels whose source sample falls outside the
/// image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// Extend the nearest edge pixel. The scale and rotation stages use
    /// this so no fill color bleeds in next to the hand.
    Replicate,
    /// Fill with a fixed color. The centering stage uses this for the
    /// canvas area it exposes.
    Constant(Rgb<u8>),
}

/// Apply `matrix` to `image` by inverse mapping.
///
/// Fails with `DegenerateGeometry` when the transform cannot be inverted;
/// that frame is unsalvageable, the batch continues.
pub fn warp_affine(
    image: &RgbImage,
    matrix: &Matrix3<f64>,
    border: Border,
) -> Result<RgbImage, FrameError> {
    let inverse = matrix
        .try_inverse()
        .ok_or_else(|| FrameError::degenerate("warp", "transform is not invertible"))?;

    let (width, height) = image.dimensions();
    let mut output = RgbImage::new(width, height);

    for out_y in 0..height {
        for out_x in 0..width {
            let src = transform_point(&inverse, Point2::new(f64::from(out_x), f64::from(out_y)));
            let pixel = match border {
                Border::Replicate => bilinear_sample(image, src.x, src.y),
                Border::Constant(fill) => {
                    let inside = src.x >= 0.0
                        && src.x <= f64::from(width - 1)
                        && src.y >= 0.0
                        && src.y <= f64::from(height - 1);
                    if inside {
                        bilinear_sample(image, src.x, src.y)
                    } else {
                        fill
                    }
                }
            };
            output.put_pixel(out_x, out_y, pixel);
        }
    }

    Ok(output)
}

/// Bilinear interpolation with edge clamping (clamping is what makes
/// `Border::Replicate` replicate).
fn bilinear_sample(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    let x_frac = x - x.floor();
    let y_frac = y - y.floor();
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;

    let get = |px: i64, py: i64| -> &Rgb<u8> {
        let px = px.clamp(0, i64::from(width) - 1) as u32;
        let py = py.clamp(0, i64::from(height) - 1) as u32;
        image.get_pixel(px, py)
    };

    let p00 = get(x0, y0);
    let p10 = get(x0 + 1, y0);
    let p01 = get(x0, y0 + 1);
    let p11 = get(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = f64::from(p00[c]) * (1.0 - x_frac) + f64::from(p10[c]) * x_frac;
        let bottom = f64::from(p01[c]) * (1.0 - x_frac) + f64::from(p11[c]) * x_frac;
        out[c] = (top * (1.0 - y_frac) + bottom * y_frac).round() as u8;
    }
    Rgb(out)
}

/// Resize to exactly the canvas dimensions. Aspect ratio is not preserved;
/// every frame in a batch shares one canvas.
pub fn resize_to_canvas(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, imageops::FilterType::Triangle)
}
