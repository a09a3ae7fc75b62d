// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DrawOptions, PoseConfig, RunConfig, TrackerConfig};
use crate::download::DEFAULT_WEIGHTS;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"Examples:
    openpose-tracker --source walk.mp4
    openpose-tracker -s walk.mp4 -o out/ --max-frames 100
    openpose-tracker -s walk.mp4 --draw-kps false --draw-limbs false
    openpose-tracker -s walk.mp4 --pad-resize --input-res 656 --gaussian-sigma 3
    openpose-tracker -s walk.mp4 --scales 0.5,1.0,1.5
    openpose-tracker -s walk.mp4 --weights-url https://example.com/openpose_body25.onnx"#)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input video
    #[arg(short, long)]
    pub source: PathBuf,

    /// Output directory [default: next free runs/track/run{N}]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to the BODY_25 ONNX weights
    #[arg(short, long, default_value = DEFAULT_WEIGHTS)]
    pub weights: PathBuf,

    /// URL to download the weights from when the file is missing
    #[arg(long)]
    pub weights_url: Option<String>,

    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<usize>,

    /// Draw keypoints
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub draw_kps: bool,

    /// Draw limbs
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub draw_limbs: bool,

    /// Draw bounding boxes
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub draw_bbox: bool,

    /// Draw track ids on the boxes (needs --draw-bbox)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub draw_ids: bool,

    /// Network input resolution (square)
    #[arg(long, default_value_t = 368)]
    pub input_res: u32,

    /// Keep the aspect ratio and pad instead of stretching
    #[arg(long, default_value_t = false)]
    pub pad_resize: bool,

    /// Minimum heatmap value for a keypoint
    #[arg(long, default_value_t = 0.1)]
    pub joint_threshold: f32,

    /// Minimum PAF alignment for a limb sample
    #[arg(long, default_value_t = 0.05)]
    pub connection_threshold: f32,

    /// Minimum joints per person
    #[arg(long, default_value_t = 4)]
    pub min_parts: usize,

    /// Gaussian sigma for heatmap smoothing
    #[arg(long)]
    pub gaussian_sigma: Option<f32>,

    /// Comma-separated inference scales; maps are averaged across them
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    pub scales: Vec<f32>,

    /// ONNX Runtime intra-op threads (0 = runtime default)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Minimum `IoU` to match a detection to a track
    #[arg(long, default_value_t = 0.3)]
    pub iou: f32,

    /// Frames a track survives without a match
    #[arg(long, default_value_t = 30)]
    pub max_age: u32,

    /// Matches before a track is reported
    #[arg(long, default_value_t = 3)]
    pub min_hits: u32,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

impl Cli {
    /// Estimator settings from the flags.
    #[must_use]
    pub fn pose_config(&self) -> PoseConfig {
        PoseConfig::new()
            .with_input_res(self.input_res)
            .with_pad_resize(self.pad_resize)
            .with_joint_threshold(self.joint_threshold)
            .with_connection_threshold(self.connection_threshold)
            .with_min_parts(self.min_parts)
            .with_gaussian_sigma(self.gaussian_sigma)
            .with_threads(self.threads)
            .with_scales(self.scales.clone())
    }

    /// Tracker settings from the flags.
    #[must_use]
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::new()
            .with_iou(self.iou)
            .with_max_age(self.max_age)
            .with_min_hits(self.min_hits)
    }

    /// Run settings from the flags.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new()
            .with_draw(DrawOptions {
                keypoints: self.draw_kps,
                limbs: self.draw_limbs,
                bbox: self.draw_bbox,
                ids: self.draw_ids,
            })
            .with_max_frames(self.max_frames)
    }
}
