//! Batch driver: stage sequencing, per-frame failure isolation, output
//! naming.
//!
//! Each frame moves through resize, detect, scale, rotate, center, write.
//! A frame that fails any stage is logged and skipped; the batch keeps
//! going. Only a missing or empty input directory aborts the whole run.
//! Nothing is retried: every failure here is deterministic for a given
//! input, so a retry would fail the same way.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader, RgbImage};
use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{BatchError, FrameError};
use crate::landmarks::{draw_landmarks, LandmarkProvider, LandmarkSet};
use crate::normalize::{align_to_angle, center_on_canvas, scale_to_reference};
use crate::transform::{resize_to_canvas, warp_affine, Border};

/// Accepted input extensions (ASCII case-insensitive).
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Subdirectories for intermediate images when stage snapshots are on.
const STAGE_DIRS: [&str; 3] = ["resized", "scaled", "aligned"];

/// Outcome counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
}

/// A fully normalized frame: the centered image, the landmark coordinates
/// on it, and the intermediates when stage snapshots are enabled.
pub struct NormalizedFrame {
    pub image: RgbImage,
    pub landmarks: LandmarkSet,
    pub stages: Option<StageSnapshots>,
}

/// Intermediate images of the stages before centering.
pub struct StageSnapshots {
    pub resized: RgbImage,
    pub scaled: RgbImage,
    pub aligned: RgbImage,
}

/// Run one frame through the full normalization chain.
///
/// Landmarks are detected once, on the resized frame; every later stage
/// transforms the coordinates algebraically. Re-detecting on intermediate
/// images would break the chain, since detection is not stable under
/// resampling.
pub fn process_frame<P: LandmarkProvider + ?Sized>(
    frame: &str,
    image: &RgbImage,
    provider: &mut P,
    config: &PipelineConfig,
) -> Result<NormalizedFrame, FrameError> {
    let mut resized = resize_to_canvas(image, config.canvas_width, config.canvas_height);

    let landmarks = provider
        .detect(frame, &resized)
        .ok_or(FrameError::NoDetection)?;

    if config.draw_landmarks {
        draw_landmarks(&mut resized, &landmarks);
    }

    let center = config.canvas_center();

    let scale = scale_to_reference(
        &landmarks,
        config.anchor_index,
        config.measure_index,
        config.ref_length,
    )?;
    let scaled = warp_affine(&resized, &scale.matrix, Border::Replicate)?;

    let rotate = align_to_angle(
        &scale.landmarks,
        config.anchor_index,
        config.measure_index,
        config.normalized_angle(),
        center,
    )?;
    let aligned = warp_affine(&scaled, &rotate.matrix, Border::Replicate)?;

    let centering = center_on_canvas(&rotate.landmarks, center);
    let centered = warp_affine(&aligned, &centering.matrix, Border::Constant(config.fill))?;

    debug!(
        "{frame}: scale det {:.4}, rotation {:.2} deg, translation ({:.1}, {:.1})",
        scale.matrix[(0, 0)] * scale.matrix[(1, 1)] - scale.matrix[(0, 1)] * scale.matrix[(1, 0)],
        config.normalized_angle(),
        centering.matrix[(0, 2)],
        centering.matrix[(1, 2)],
    );

    let stages = config.save_stages.then(|| StageSnapshots {
        resized,
        scaled,
        aligned,
    });

    Ok(NormalizedFrame {
        image: centered,
        landmarks: centering.landmarks,
        stages,
    })
}

/// Enumerate, normalize, and write every image in `input_dir`.
///
/// Frames are processed strictly sequentially, in lexicographic file-name
/// order. Sequence numbers are assigned per enumerated file, so a skipped
/// frame still consumes its index and the mapping from input listing to
/// output names stays stable.
pub fn run_batch<P: LandmarkProvider + ?Sized>(
    input_dir: &Path,
    output_dir: &Path,
    provider: &mut P,
    config: &PipelineConfig,
) -> Result<BatchSummary, BatchError> {
    let files = list_images(input_dir)?;
    info!("{} image files in {input_dir:?}", files.len());

    fs::create_dir_all(output_dir)?;
    if config.save_stages {
        for stage in STAGE_DIRS {
            fs::create_dir_all(output_dir.join(stage))?;
        }
    }

    let mut summary = BatchSummary::default();
    for (index, path) in files.iter().enumerate() {
        let seq = index + 1;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match normalize_file(path, provider, config) {
            Ok(frame) => {
                let out_path = output_dir.join(output_name(seq, config, path));
                write_image(&frame.image, &out_path)?;
                if let Some(stages) = &frame.stages {
                    write_image(&stages.resized, &output_dir.join("resized").join(&name))?;
                    write_image(&stages.scaled, &output_dir.join("scaled").join(&name))?;
                    write_image(&stages.aligned, &output_dir.join("aligned").join(&name))?;
                }
                info!("{name}: written as {:?}", out_path.file_name().unwrap_or_default());
                summary.written += 1;
            }
            Err(err) => {
                warn!("{name}: skipped: {err}");
                summary.skipped += 1;
            }
        }
    }

    info!(
        "batch finished: {} written, {} skipped",
        summary.written, summary.skipped
    );
    Ok(summary)
}

fn normalize_file<P: LandmarkProvider + ?Sized>(
    path: &Path,
    provider: &mut P,
    config: &PipelineConfig,
) -> Result<NormalizedFrame, FrameError> {
    let image = ImageReader::open(path)
        .map_err(|e| FrameError::Decode(image::ImageError::IoError(e)))?
        .decode()?
        .to_rgb8();
    let frame = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    process_frame(&frame, &image, provider, config)
}

/// Deterministic enumeration: image files sorted lexicographically
/// ascending by file name. Output indices depend on this order, so it is
/// a contract, not an accident of filesystem listing order.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let entries = fs::read_dir(dir).map_err(|source| BatchError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| BatchError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(BatchError::Empty {
            path: dir.to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// `image<seq>_<angle><ext>`: the per-batch sequence number plus the
/// target angle, so runs at different angles over the same input never
/// collide. The extension follows the source file.
fn output_name(seq: usize, config: &PipelineConfig, source: &Path) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png");
    format!("image{seq}_{}.{ext}", format_angle(config.normalized_angle()))
}

/// Integral angles print without a decimal point (`image3_30.jpg`).
fn format_angle(angle: f64) -> String {
    if angle.fract() == 0.0 {
        format!("{}", angle as i64)
    } else {
        format!("{angle}")
    }
}

/// Write via a temporary sibling and rename into place, so a cancelled
/// batch never leaves a half-written output file.
fn write_image(image: &RgbImage, path: &Path) -> Result<(), BatchError> {
    let format = ImageFormat::from_path(path).map_err(|source| BatchError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("tmp");
    image
        .save_with_format(&tmp, format)
        .map_err(|source| BatchError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    fs::rename(&tmp, path)?;
    Ok(())
}
