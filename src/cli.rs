use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{PipelineConfig, DEFAULT_FILL};
use crate::landmarks::{MIDDLE_FINGER_MCP, MIDDLE_FINGER_TIP};

#[derive(Parser, Debug)]
#[command(name = "hand-align")]
#[command(
    version,
    about = "Normalize hand photographs to a consistent scale, orientation, and position"
)]
pub struct Cli {
    /// Directory of input images (.jpg, .jpeg, .png)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Landmark annotation file: JSON mapping frame file names to 21
    /// normalized [x, y] points
    #[arg(short, long)]
    pub landmarks: PathBuf,

    /// Output directory [default: <input>_aligned]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Canvas width every frame is resized to, in pixels
    #[arg(long, default_value_t = 1000)]
    pub canvas_width: u32,

    /// Canvas height every frame is resized to, in pixels
    #[arg(long, default_value_t = 1280)]
    pub canvas_height: u32,

    /// Target anchor-to-measurement distance after scaling, in pixels
    #[arg(long, default_value_t = 600.0)]
    pub ref_length: f64,

    /// Target angle of the anchor-to-measurement vector, in degrees
    /// clockwise from vertical
    #[arg(short, long, default_value_t = 30.0)]
    pub angle: f64,

    /// Landmark held fixed while scaling [default: middle finger knuckle]
    #[arg(long, default_value_t = MIDDLE_FINGER_MCP)]
    pub anchor_index: usize,

    /// Landmark measured against the anchor [default: middle fingertip]
    #[arg(long, default_value_t = MIDDLE_FINGER_TIP)]
    pub measure_index: usize,

    /// Also write each stage's intermediate images
    #[arg(long)]
    pub save_stages: bool,

    /// Draw the detected hand skeleton onto the frames
    #[arg(long)]
    pub draw_landmarks: bool,

    /// Show per-frame processing details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let name = self.input.file_name().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(Path::new("."));
            parent.join(format!("{name}_aligned"))
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            ref_length: self.ref_length,
            target_angle: self.angle,
            anchor_index: self.anchor_index,
            measure_index: self.measure_index,
            fill: DEFAULT_FILL,
            save_stages: self.save_stages,
            draw_landmarks: self.draw_landmarks,
        }
    }
}
