//! Shared affine transform math.
//!
//! All transforms are homogeneous 3x3 matrices whose last row is `0 0 1`;
//! the 2x3 affine part is the top two rows. A transform whose 2x2 linear
//! part is (near-)singular is degenerate and terminal for the frame that
//! produced it.

use nalgebra::{Matrix2, Matrix3, Point2, Vector2, Vector3};

/// Two landmarks closer than this (pixels) cannot define a reference
/// vector.
pub const MIN_REFERENCE_LENGTH: f64 = 1e-6;

/// A linear part with |det| below this is treated as rank deficient.
pub const MIN_DETERMINANT: f64 = 1e-9;

/// Point spread below this cannot anchor a similarity fit.
const MIN_VARIANCE: f64 = 1e-12;

/// Angle of the vector from `anchor` to `measure`, in degrees clockwise
/// from vertical, in `(-180, 180]`: 0 deg puts `measure` directly above
/// `anchor`, 90 deg directly to its right.
///
/// Computed as `atan2(dx, -dy)`; image y grows downward, so `-dy` points
/// up. This is the one angle convention of the whole crate; every stage
/// and test measures against it.
pub fn clockwise_from_vertical(anchor: Point2<f64>, measure: Point2<f64>) -> f64 {
    let d = measure - anchor;
    d.x.atan2(-d.y).to_degrees()
}

/// Transform a point with a homogeneous affine matrix.
pub fn transform_point(matrix: &Matrix3<f64>, point: Point2<f64>) -> Point2<f64> {
    let p = matrix * Vector3::new(point.x, point.y, 1.0);
    Point2::new(p.x, p.y)
}

/// Pure translation by `offset`.
pub fn translation(offset: Vector2<f64>) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, offset.x, 0.0, 1.0, offset.y, 0.0, 0.0, 1.0)
}

/// Rotation by `degrees` about a fixed `center`, in the clockwise-from-
/// vertical sense: applying it reduces a vector's
/// [`clockwise_from_vertical`] angle by `degrees`.
pub fn rotation_about(center: Point2<f64>, degrees: f64) -> Matrix3<f64> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let rotation = Matrix3::new(cos, sin, 0.0, -sin, cos, 0.0, 0.0, 0.0, 1.0);
    translation(center.coords) * rotation * translation(-center.coords)
}

/// True when the linear part of `matrix` is (near-)singular.
pub fn is_degenerate(matrix: &Matrix3<f64>) -> bool {
    let det = matrix[(0, 0)] * matrix[(1, 1)] - matrix[(0, 1)] * matrix[(1, 0)];
    det.abs() < MIN_DETERMINANT
}

/// Least-squares similarity fit (uniform scale, rotation, translation)
/// mapping `src` onto `dst`, as a homogeneous matrix.
///
/// Solving the map from correspondence pairs instead of composing it by
/// hand guarantees the transform applied to the image pixels is exactly
/// the one applied to the landmark coordinates. Returns `None` when the
/// source points are (near-)coincident or the fit collapses.
pub fn fit_similarity(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    if src.len() != dst.len() || src.len() < 2 {
        return None;
    }
    let n = src.len() as f64;

    let mean = |pts: &[Point2<f64>]| {
        pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n
    };
    let mu_src = mean(src);
    let mu_dst = mean(dst);

    let mut src_variance = 0.0;
    let mut covariance = Matrix2::zeros();
    for (s, d) in src.iter().zip(dst) {
        let xs = s.coords - mu_src;
        let xd = d.coords - mu_dst;
        src_variance += xs.norm_squared();
        covariance += xd * xs.transpose();
    }
    src_variance /= n;
    covariance /= n;

    if src_variance < MIN_VARIANCE {
        return None;
    }

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    // Reflection guard: similarity transforms preserve orientation.
    let mut sign = Matrix2::identity();
    if u.determinant() * v_t.determinant() < 0.0 {
        sign[(1, 1)] = -1.0;
    }

    let rotation = u * sign * v_t;
    let scale =
        (svd.singular_values[0] + svd.singular_values[1] * sign[(1, 1)]) / src_variance;
    let t = mu_dst - scale * rotation * mu_src;

    let matrix = Matrix3::new(
        scale * rotation[(0, 0)],
        scale * rotation[(0, 1)],
        t.x,
        scale * rotation[(1, 0)],
        scale * rotation[(1, 1)],
        t.y,
        0.0,
        0.0,
        1.0,
    );

    if is_degenerate(&matrix) {
        None
    } else {
        Some(matrix)
    }
}
