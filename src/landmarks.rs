//! Hand landmark model and the pluggable detection boundary.
//!
//! The landmark index scheme is the 21-point MediaPipe Hands numbering:
//! wrist at 0, then four points per finger walking from the palm outward
//! (thumb 1-4, index 5-8, middle 9-12, ring 13-16, pinky 17-20). The same
//! physical point always sits at the same index, which is what lets the
//! normalization stages address "the middle finger knuckle" by number.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use nalgebra::{Matrix3, Point2};
use serde::Deserialize;

use crate::geometry::transform_point;

/// Number of keypoints in the hand landmark scheme.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_FINGER_TIP: usize = 8;
/// Base knuckle of the middle finger; the default scale anchor.
pub const MIDDLE_FINGER_MCP: usize = 9;
/// Middle fingertip; the default measurement landmark.
pub const MIDDLE_FINGER_TIP: usize = 12;
pub const RING_FINGER_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

/// Skeleton connectivity, used by the debug overlay.
pub const CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// An ordered, fixed-cardinality set of detected hand keypoints in pixel
/// coordinates.
///
/// A set is produced once per frame and never mutated; the geometric stages
/// derive new sets via [`LandmarkSet::transformed`].
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Point2<f64>; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Point2<f64>; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Build a set from normalized `[0, 1]` coordinates (the space hand
    /// landmark models report in), scaled to pixel coordinates on an
    /// image of the given dimensions.
    ///
    /// Returns `None` unless exactly [`LANDMARK_COUNT`] points are given.
    pub fn from_normalized(coords: &[[f64; 2]], width: u32, height: u32) -> Option<Self> {
        if coords.len() != LANDMARK_COUNT {
            return None;
        }
        let mut points = [Point2::origin(); LANDMARK_COUNT];
        for (point, raw) in points.iter_mut().zip(coords) {
            *point = Point2::new(raw[0] * f64::from(width), raw[1] * f64::from(height));
        }
        Some(Self { points })
    }

    /// The keypoint at `index`. Panics if `index` is not below
    /// [`LANDMARK_COUNT`]; the configured indices are validated up front.
    pub fn point(&self, index: usize) -> Point2<f64> {
        self.points[index]
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Arithmetic mean of all keypoints.
    pub fn centroid(&self) -> Point2<f64> {
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / LANDMARK_COUNT as f64)
    }

    /// Apply `transform` to every keypoint, yielding a new set. The stages
    /// carry coordinates through the transform chain with this instead of
    /// re-detecting on intermediate images.
    pub fn transformed(&self, transform: &Matrix3<f64>) -> Self {
        Self {
            points: self.points.map(|p| transform_point(transform, p)),
        }
    }
}

/// Pluggable hand landmark backend.
///
/// Returns the landmark set for an image, or `None` when no hand is found.
/// Implementations may carry warmed-up model state, so the provider is a
/// scoped resource: construct it once before a batch, pass it by reference
/// into the pipeline, and drop it afterwards.
pub trait LandmarkProvider {
    /// `frame` names the source image; annotation-backed providers key on
    /// it, inference backends are free to ignore it.
    fn detect(&mut self, frame: &str, image: &RgbImage) -> Option<LandmarkSet>;
}

/// Landmark annotation document: frame file name mapped to 21 `[x, y]`
/// pairs in normalized image coordinates.
#[derive(Debug, Deserialize)]
struct AnnotationFile {
    frames: HashMap<String, Vec<[f64; 2]>>,
}

/// [`LandmarkProvider`] backed by a precomputed annotation file, e.g. an
/// export of a MediaPipe run over the same frames.
#[derive(Debug)]
pub struct AnnotationProvider {
    frames: HashMap<String, Vec<[f64; 2]>>,
}

impl AnnotationProvider {
    /// Load and validate an annotation file. Every entry must carry
    /// exactly [`LANDMARK_COUNT`] points.
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open annotations {path:?}"))?;
        let doc: AnnotationFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse annotations {path:?}"))?;
        for (frame, points) in &doc.frames {
            if points.len() != LANDMARK_COUNT {
                bail!(
                    "annotation for {frame:?} has {} points, expected {LANDMARK_COUNT}",
                    points.len()
                );
            }
        }
        Ok(Self { frames: doc.frames })
    }

    /// Number of annotated frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkProvider for AnnotationProvider {
    fn detect(&mut self, frame: &str, image: &RgbImage) -> Option<LandmarkSet> {
        let coords = self.frames.get(frame)?;
        LandmarkSet::from_normalized(coords, image.width(), image.height())
    }
}

/// Draw the hand skeleton onto `image`: bones as green segments, joints as
/// red dots.
pub fn draw_landmarks(image: &mut RgbImage, landmarks: &LandmarkSet) {
    const BONE: Rgb<u8> = Rgb([0, 192, 0]);
    const JOINT: Rgb<u8> = Rgb([220, 0, 0]);

    for &(a, b) in &CONNECTIONS {
        let pa = landmarks.point(a);
        let pb = landmarks.point(b);
        draw_line_segment_mut(
            image,
            (pa.x as f32, pa.y as f32),
            (pb.x as f32, pb.y as f32),
            BONE,
        );
    }
    for p in landmarks.points() {
        draw_filled_circle_mut(image, (p.x as i32, p.y as i32), 3, JOINT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn uniform_normalized() -> Vec<[f64; 2]> {
        (0..LANDMARK_COUNT)
            .map(|i| [i as f64 / 40.0, i as f64 / 80.0])
            .collect()
    }

    #[test]
    fn from_normalized_scales_by_dimensions() {
        let coords = uniform_normalized();
        let set = LandmarkSet::from_normalized(&coords, 200, 400).unwrap();
        let p = set.point(10);
        assert!((p.x - 0.25 * 200.0).abs() < 1e-12);
        assert!((p.y - 0.125 * 400.0).abs() < 1e-12);
    }

    #[test]
    fn from_normalized_rejects_wrong_cardinality() {
        let coords = vec![[0.5, 0.5]; LANDMARK_COUNT - 1];
        assert!(LandmarkSet::from_normalized(&coords, 100, 100).is_none());
    }

    #[test]
    fn centroid_is_mean_of_points() {
        let points = [Point2::new(2.0, 4.0); LANDMARK_COUNT];
        let set = LandmarkSet::new(points);
        assert_eq!(set.centroid(), Point2::new(2.0, 4.0));
    }

    #[test]
    fn annotation_provider_detects_known_frames_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let doc = serde_json::json!({
            "frames": { "a.png": uniform_normalized() }
        });
        write!(file, "{doc}").unwrap();

        let mut provider = AnnotationProvider::load(file.path()).unwrap();
        assert_eq!(provider.len(), 1);

        let image = RgbImage::new(80, 80);
        assert!(provider.detect("a.png", &image).is_some());
        assert!(provider.detect("missing.png", &image).is_none());
    }

    #[test]
    fn annotation_provider_rejects_wrong_cardinality_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let doc = serde_json::json!({
            "frames": { "a.png": [[0.1, 0.2], [0.3, 0.4]] }
        });
        write!(file, "{doc}").unwrap();

        assert!(AnnotationProvider::load(file.path()).is_err());
    }

    #[test]
    fn connections_stay_in_range() {
        for &(a, b) in &CONNECTIONS {
            assert!(a < LANDMARK_COUNT && b < LANDMARK_COUNT);
        }
    }
}
