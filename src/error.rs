use std::path::PathBuf;

use thiserror::Error;

/// Per-frame failure. Terminal for that frame only: the batch driver logs
/// the reason and moves on. None of these are retried, because every cause
/// is deterministic given the same input.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no hand detected")]
    NoDetection,

    /// The anchor/measurement landmarks coincide, or a computed transform
    /// lost rank. `stage` names where the geometry collapsed.
    #[error("degenerate geometry in {stage} stage: {detail}")]
    DegenerateGeometry { stage: &'static str, detail: String },
}

impl FrameError {
    pub fn degenerate(stage: &'static str, detail: impl Into<String>) -> Self {
        FrameError::DegenerateGeometry {
            stage,
            detail: detail.into(),
        }
    }
}

/// Batch-level failure. Nothing can be processed; the process exits
/// non-zero.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot read input directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no images (.jpg, .jpeg, .png) found in {path:?}")]
    Empty { path: PathBuf },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
