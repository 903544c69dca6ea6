//! Immutable batch configuration.

use image::Rgb;
use nalgebra::Point2;
use thiserror::Error;

use crate::landmarks::{LANDMARK_COUNT, MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP};

/// Background color exposed by the centering translation.
pub const DEFAULT_FILL: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("canvas dimensions must be positive, got {0}x{1}")]
    EmptyCanvas(u32, u32),

    #[error("reference length must be positive, got {0}")]
    NonPositiveLength(String),

    #[error("landmark index {0} out of range 0..{max}", max = LANDMARK_COUNT)]
    IndexOutOfRange(usize),

    #[error("anchor and measurement landmarks must differ (both {0})")]
    EqualIndices(usize),
}

/// Everything the pipeline needs to know about a batch. Built once before
/// processing, validated once, read-only afterward.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Common canvas width every frame is resized to, in pixels.
    pub canvas_width: u32,
    /// Common canvas height every frame is resized to, in pixels.
    pub canvas_height: u32,
    /// Target anchor-to-measurement distance after scaling, in pixels.
    pub ref_length: f64,
    /// Target orientation of the anchor-to-measurement vector, in degrees
    /// clockwise from vertical.
    pub target_angle: f64,
    /// Landmark held fixed by the scale stage.
    pub anchor_index: usize,
    /// Landmark whose distance from the anchor is measured.
    pub measure_index: usize,
    /// Fill color for the canvas area exposed by the centering stage.
    pub fill: Rgb<u8>,
    /// Also write each stage's intermediate image under a per-stage
    /// subdirectory of the output directory.
    pub save_stages: bool,
    /// Draw the detected skeleton onto the frame before warping.
    pub draw_landmarks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1000,
            canvas_height: 1280,
            ref_length: 600.0,
            target_angle: 30.0,
            anchor_index: MIDDLE_FINGER_MCP,
            measure_index: MIDDLE_FINGER_TIP,
            fill: DEFAULT_FILL,
            save_stages: false,
            draw_landmarks: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::EmptyCanvas(
                self.canvas_width,
                self.canvas_height,
            ));
        }
        if !(self.ref_length > 0.0) {
            return Err(ConfigError::NonPositiveLength(self.ref_length.to_string()));
        }
        for index in [self.anchor_index, self.measure_index] {
            if index >= LANDMARK_COUNT {
                return Err(ConfigError::IndexOutOfRange(index));
            }
        }
        if self.anchor_index == self.measure_index {
            return Err(ConfigError::EqualIndices(self.anchor_index));
        }
        Ok(())
    }

    /// Canvas center: the fixed point of the rotation stage and the target
    /// of the centering stage. Integer halving, so a 1000x1280 canvas
    /// centers on (500, 640).
    pub fn canvas_center(&self) -> Point2<f64> {
        Point2::new(
            f64::from(self.canvas_width / 2),
            f64::from(self.canvas_height / 2),
        )
    }

    /// Target angle reduced into `[0, 360)`; used for both the rotation
    /// target and the output file names, so equivalent angles produce
    /// identical results and names.
    pub fn normalized_angle(&self) -> f64 {
        self.target_angle.rem_euclid(360.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_canvas_is_rejected() {
        let config = PipelineConfig {
            canvas_width: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCanvas(..))));
    }

    #[test]
    fn non_positive_reference_length_is_rejected() {
        for bad in [0.0, -5.0, f64::NAN] {
            let config = PipelineConfig {
                ref_length: bad,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NonPositiveLength(_))
            ));
        }
    }

    #[test]
    fn landmark_indices_are_checked() {
        let out_of_range = PipelineConfig {
            measure_index: LANDMARK_COUNT,
            ..Default::default()
        };
        assert_eq!(
            out_of_range.validate(),
            Err(ConfigError::IndexOutOfRange(LANDMARK_COUNT))
        );

        let equal = PipelineConfig {
            anchor_index: 9,
            measure_index: 9,
            ..Default::default()
        };
        assert_eq!(equal.validate(), Err(ConfigError::EqualIndices(9)));
    }

    #[test]
    fn canvas_center_uses_integer_halving() {
        let config = PipelineConfig::default();
        assert_eq!(config.canvas_center(), Point2::new(500.0, 640.0));

        let odd = PipelineConfig {
            canvas_width: 1001,
            canvas_height: 1281,
            ..Default::default()
        };
        assert_eq!(odd.canvas_center(), Point2::new(500.0, 640.0));
    }

    #[test]
    fn angles_normalize_into_one_turn() {
        let config = PipelineConfig {
            target_angle: -30.0,
            ..Default::default()
        };
        assert_eq!(config.normalized_angle(), 330.0);

        let wrapped = PipelineConfig {
            target_angle: 390.0,
            ..Default::default()
        };
        assert_eq!(wrapped.normalized_angle(), 30.0);
    }
}
