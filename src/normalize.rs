//! The three geometric normalization stages: scale, rotation, centering.
//!
//! Each stage computes a transform from the incoming landmark set and
//! returns that transform together with the set it produces, so the next
//! stage (and the image warp) work from the same coordinates. Nothing here
//! re-detects landmarks on intermediate images.

use nalgebra::{Matrix3, Point2};

use crate::error::FrameError;
use crate::geometry::{
    clockwise_from_vertical, fit_similarity, rotation_about, translation, MIN_REFERENCE_LENGTH,
};
use crate::landmarks::LandmarkSet;

/// Result of one geometric stage: the transform and the landmark set with
/// that transform applied.
#[derive(Debug, Clone)]
pub struct StageTransform {
    pub matrix: Matrix3<f64>,
    pub landmarks: LandmarkSet,
}

/// Similarity transform that fixes the anchor landmark and rescales the
/// hand so the anchor-to-measurement distance becomes `ref_length` pixels.
///
/// The target points `P' = A + (P - A) * scale` are used as correspondence
/// pairs for a least-squares similarity fit, so the map applied to the
/// image is exactly the map applied to the landmarks.
pub fn scale_to_reference(
    landmarks: &LandmarkSet,
    anchor: usize,
    measure: usize,
    ref_length: f64,
) -> Result<StageTransform, FrameError> {
    let a = landmarks.point(anchor);
    let b = landmarks.point(measure);

    let current_length = (b - a).norm();
    if current_length < MIN_REFERENCE_LENGTH {
        return Err(FrameError::degenerate(
            "scale",
            format!("anchor/measurement distance is {current_length:.3e} px"),
        ));
    }

    let scale = ref_length / current_length;
    let scaled: Vec<Point2<f64>> = landmarks
        .points()
        .iter()
        .map(|p| a + (p - a) * scale)
        .collect();

    let matrix = fit_similarity(landmarks.points(), &scaled)
        .ok_or_else(|| FrameError::degenerate("scale", "similarity fit collapsed"))?;

    Ok(StageTransform {
        matrix,
        landmarks: landmarks.transformed(&matrix),
    })
}

/// Rotation about the canvas `center` that brings the anchor-to-measurement
/// vector to `target_angle` degrees clockwise from vertical.
///
/// The anchor/measurement distance is re-validated here: the scale stage
/// already rejected coincident points, but this stage must hold on any
/// input it is given.
pub fn align_to_angle(
    landmarks: &LandmarkSet,
    anchor: usize,
    measure: usize,
    target_angle: f64,
    center: Point2<f64>,
) -> Result<StageTransform, FrameError> {
    let a = landmarks.point(anchor);
    let b = landmarks.point(measure);

    if (b - a).norm() < MIN_REFERENCE_LENGTH {
        return Err(FrameError::degenerate(
            "rotation",
            "anchor and measurement landmarks coincide",
        ));
    }

    let current_angle = clockwise_from_vertical(a, b);
    let delta = current_angle - target_angle;
    let matrix = rotation_about(center, delta);

    Ok(StageTransform {
        matrix,
        landmarks: landmarks.transformed(&matrix),
    })
}

/// Translation that moves the centroid of all landmarks to the canvas
/// `center`.
///
/// The full centroid, not a single keypoint, keeps the anchor choice from
/// dictating where the hand lands and damps jitter across a frame
/// sequence.
pub fn center_on_canvas(landmarks: &LandmarkSet, center: Point2<f64>) -> StageTransform {
    let centroid = landmarks.centroid();
    let matrix = translation(center - centroid);
    StageTransform {
        matrix,
        landmarks: landmarks.transformed(&matrix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::transform_point;
    use crate::landmarks::{LANDMARK_COUNT, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP};

    /// A synthetic hand: 21 distinct points with the middle finger
    /// knuckle/tip at chosen positions.
    fn synthetic_hand(knuckle: Point2<f64>, tip: Point2<f64>) -> LandmarkSet {
        let mut points = [Point2::origin(); LANDMARK_COUNT];
        for (i, p) in points.iter_mut().enumerate() {
            *p = Point2::new(
                knuckle.x - 90.0 + 11.0 * i as f64,
                knuckle.y + 40.0 - 7.0 * (i % 5) as f64,
            );
        }
        points[MIDDLE_FINGER_MCP] = knuckle;
        points[MIDDLE_FINGER_TIP] = tip;
        LandmarkSet::new(points)
    }

    #[test]
    fn scale_maps_reference_pair_to_reference_length() {
        for distance in [30.0, 150.0, 299.9, 1200.0] {
            let knuckle = Point2::new(500.0, 700.0);
            let tip = Point2::new(500.0, 700.0 - distance);
            let hand = synthetic_hand(knuckle, tip);

            let stage =
                scale_to_reference(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, 600.0).unwrap();
            let a = stage.landmarks.point(MIDDLE_FINGER_MCP);
            let b = stage.landmarks.point(MIDDLE_FINGER_TIP);
            assert!(((b - a).norm() - 600.0).abs() < 1e-6);
        }
    }

    #[test]
    fn scale_fixes_the_anchor() {
        let knuckle = Point2::new(420.0, 610.0);
        let hand = synthetic_hand(knuckle, Point2::new(390.0, 380.0));
        let stage =
            scale_to_reference(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, 600.0).unwrap();
        let a = stage.landmarks.point(MIDDLE_FINGER_MCP);
        assert!((a - knuckle).norm() < 1e-6);
    }

    #[test]
    fn scale_rejects_coincident_reference_pair() {
        let knuckle = Point2::new(500.0, 700.0);
        let hand = synthetic_hand(knuckle, knuckle);
        let result = scale_to_reference(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, 600.0);
        assert!(matches!(
            result,
            Err(FrameError::DegenerateGeometry { stage: "scale", .. })
        ));
    }

    #[test]
    fn rotation_is_identity_when_already_aligned() {
        let center = Point2::new(500.0, 640.0);
        for target in [0.0f64, 30.0, 117.5, 270.0, 359.0] {
            let r = target.to_radians();
            let knuckle = Point2::new(500.0, 700.0);
            let tip = knuckle + nalgebra::Vector2::new(r.sin(), -r.cos()) * 250.0;
            let hand = synthetic_hand(knuckle, tip);

            let stage =
                align_to_angle(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, target, center)
                    .unwrap();
            let probe = Point2::new(123.0, 456.0);
            let mapped = transform_point(&stage.matrix, probe);
            assert!((mapped - probe).norm() < 1e-6);
        }
    }

    #[test]
    fn rotation_reaches_target_from_any_start() {
        let center = Point2::new(500.0, 640.0);
        for start in (0..360).step_by(45) {
            for target in [0.0, 30.0, 200.0] {
                let r = (start as f64).to_radians();
                let knuckle = Point2::new(480.0, 650.0);
                let tip = knuckle + nalgebra::Vector2::new(r.sin(), -r.cos()) * 300.0;
                let hand = synthetic_hand(knuckle, tip);

                let stage =
                    align_to_angle(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, target, center)
                        .unwrap();
                let a = stage.landmarks.point(MIDDLE_FINGER_MCP);
                let b = stage.landmarks.point(MIDDLE_FINGER_TIP);
                let reached = clockwise_from_vertical(a, b);
                let diff = (reached - target).rem_euclid(360.0);
                assert!(
                    diff.min(360.0 - diff) < 1e-6,
                    "start {start} target {target} reached {reached}"
                );
            }
        }
    }

    #[test]
    fn rotation_rejects_coincident_reference_pair() {
        let center = Point2::new(500.0, 640.0);
        let knuckle = Point2::new(500.0, 700.0);
        let hand = synthetic_hand(knuckle, knuckle);
        let result = align_to_angle(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, 30.0, center);
        assert!(matches!(
            result,
            Err(FrameError::DegenerateGeometry {
                stage: "rotation",
                ..
            })
        ));
    }

    #[test]
    fn centering_moves_centroid_to_center() {
        let center = Point2::new(500.0, 640.0);
        for (kx, ky) in [(120.0, 90.0), (500.0, 700.0), (910.0, 1200.0)] {
            let hand = synthetic_hand(Point2::new(kx, ky), Point2::new(kx + 40.0, ky - 260.0));
            let stage = center_on_canvas(&hand, center);
            assert!((stage.landmarks.centroid() - center).norm() < 1e-9);
        }
    }

    /// The worked example: 1000x1280 canvas, reference length 600, target
    /// angle 30, knuckle (500,700), tip (500,400).
    #[test]
    fn end_to_end_reference_example() {
        let center = Point2::new(500.0, 640.0);
        let hand = synthetic_hand(Point2::new(500.0, 700.0), Point2::new(500.0, 400.0));

        let scale = scale_to_reference(&hand, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, 600.0).unwrap();
        let a = scale.landmarks.point(MIDDLE_FINGER_MCP);
        let b = scale.landmarks.point(MIDDLE_FINGER_TIP);
        // Distance 300 and reference 600: the hand doubles, anchor fixed.
        assert!((a - Point2::new(500.0, 700.0)).norm() < 1e-6);
        assert!((b - Point2::new(500.0, 100.0)).norm() < 1e-6);

        let rotate =
            align_to_angle(&scale.landmarks, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP, 30.0, center)
                .unwrap();
        let a = rotate.landmarks.point(MIDDLE_FINGER_MCP);
        let b = rotate.landmarks.point(MIDDLE_FINGER_TIP);
        assert!((clockwise_from_vertical(a, b) - 30.0).abs() < 1e-9);
        assert!(((b - a).norm() - 600.0).abs() < 1e-6);

        let centered = center_on_canvas(&rotate.landmarks, center);
        assert!((centered.landmarks.centroid() - center).norm() < 1e-9);
    }
}
