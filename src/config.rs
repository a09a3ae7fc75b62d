// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Run configuration and common option types.
//!
//! This module defines the immutable option structs consumed by the pipeline:
//! [`PoseConfig`] for the pose estimator, [`TrackerConfig`] for the tracker, and
//! [`RunConfig`] / [`DrawOptions`] for a single video processing run. All of them
//! use a builder pattern and are passed explicitly into the entry points.

use crate::error::{PipelineError, Result};

/// Memory layout of the network input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, as exported from the Keras graph.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`.
    Nchw,
}

/// Configuration for the OpenPose estimator.
///
/// # Example
///
/// ```rust
/// use openpose_tracker::PoseConfig;
///
/// let config = PoseConfig::new()
///     .with_input_res(368)
///     .with_joint_threshold(0.1)
///     .with_pad_resize(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfig {
    /// Square network input resolution in pixels.
    pub input_res: u32,
    /// Minimum heatmap value for a pixel to become a joint candidate.
    pub joint_threshold: f32,
    /// Minimum projected PAF value for a sample point along a limb to count as aligned.
    pub connection_threshold: f32,
    /// Minimum number of joints a person needs to be reported.
    pub min_parts: usize,
    /// Resize preserving aspect ratio and pad to a square instead of stretching.
    pub pad_resize: bool,
    /// Constant used for the padded border when `pad_resize` is set.
    pub pad_value: u8,
    /// Optional Gaussian smoothing of the heatmaps before peak extraction.
    pub gaussian_sigma: Option<f32>,
    /// Number of intra-op threads for ONNX Runtime.
    /// `0` lets ONNX Runtime decide.
    pub num_threads: usize,
    /// Input tensor layout expected by the exported model.
    pub layout: TensorLayout,
    /// Input scales for multi-scale inference. The network runs once per
    /// scale and the maps are averaged. Scales other than `1.0` need a model
    /// exported with dynamic spatial dimensions.
    pub scales: Vec<f32>,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            input_res: 368,
            joint_threshold: 0.1,
            connection_threshold: 0.05,
            min_parts: 4,
            pad_resize: false,
            pad_value: 0,
            gaussian_sigma: None,
            num_threads: 0,
            layout: TensorLayout::Nhwc,
            scales: vec![1.0],
        }
    }
}

impl PoseConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the square network input resolution.
    #[must_use]
    pub const fn with_input_res(mut self, res: u32) -> Self {
        self.input_res = res;
        self
    }

    /// Set the heatmap threshold for joint candidates.
    #[must_use]
    pub const fn with_joint_threshold(mut self, threshold: f32) -> Self {
        self.joint_threshold = threshold;
        self
    }

    /// Set the PAF alignment threshold for limb candidates.
    #[must_use]
    pub const fn with_connection_threshold(mut self, threshold: f32) -> Self {
        self.connection_threshold = threshold;
        self
    }

    /// Set the minimum number of visible joints per person.
    #[must_use]
    pub const fn with_min_parts(mut self, min_parts: usize) -> Self {
        self.min_parts = min_parts;
        self
    }

    /// Enable or disable aspect-preserving resize with padding.
    #[must_use]
    pub const fn with_pad_resize(mut self, pad_resize: bool) -> Self {
        self.pad_resize = pad_resize;
        self
    }

    /// Set the padding value used by `pad_resize`.
    #[must_use]
    pub const fn with_pad_value(mut self, value: u8) -> Self {
        self.pad_value = value;
        self
    }

    /// Enable Gaussian heatmap smoothing with the given sigma.
    #[must_use]
    pub const fn with_gaussian_sigma(mut self, sigma: Option<f32>) -> Self {
        self.gaussian_sigma = sigma;
        self
    }

    /// Set the number of threads for inference.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the inference scales, e.g. `vec![0.5, 1.0, 1.5]`.
    #[must_use]
    pub fn with_scales(mut self, scales: Vec<f32>) -> Self {
        self.scales = scales;
        self
    }

    /// Network input side for one scale.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn scaled_res(&self, scale: f32) -> u32 {
        (self.input_res as f32 * scale).round().max(0.0) as u32
    }

    /// Set the input tensor layout.
    #[must_use]
    pub const fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] when a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.input_res < 8 {
            return Err(PipelineError::ConfigError(format!(
                "input_res must be at least 8, got {}",
                self.input_res
            )));
        }
        if !(0.0..=1.0).contains(&self.joint_threshold) {
            return Err(PipelineError::ConfigError(format!(
                "joint_threshold must be in [0, 1], got {}",
                self.joint_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.connection_threshold) {
            return Err(PipelineError::ConfigError(format!(
                "connection_threshold must be in [0, 1], got {}",
                self.connection_threshold
            )));
        }
        if self.min_parts < 2 {
            return Err(PipelineError::ConfigError(format!(
                "min_parts must be at least 2, got {}",
                self.min_parts
            )));
        }
        if self.scales.is_empty() {
            return Err(PipelineError::ConfigError(
                "at least one inference scale is required".to_string(),
            ));
        }
        if let Some(&scale) = self
            .scales
            .iter()
            .find(|&&s| !s.is_finite() || s <= 0.0 || self.scaled_res(s) < 8)
        {
            return Err(PipelineError::ConfigError(format!(
                "scale {scale} gives no usable input at resolution {}",
                self.input_res
            )));
        }
        if let Some(sigma) = self.gaussian_sigma
            && sigma <= 0.0
        {
            return Err(PipelineError::ConfigError(format!(
                "gaussian_sigma must be positive, got {sigma}"
            )));
        }
        Ok(())
    }
}

/// Configuration for the built-in [`SortTracker`](crate::tracker::SortTracker).
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Minimum `IoU` between a predicted track box and a detection box to match them.
    pub iou_threshold: f32,
    /// Number of consecutive unmatched frames after which a track is dropped.
    pub max_age: u32,
    /// Number of matches before a track is reported.
    pub min_hits: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_age: 30,
            min_hits: 3,
        }
    }
}

impl TrackerConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the association `IoU` threshold.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the number of unmatched frames a track survives.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: u32) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the number of matches required before a track is reported.
    #[must_use]
    pub const fn with_min_hits(mut self, min_hits: u32) -> Self {
        self.min_hits = min_hits;
        self
    }

    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] when a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(PipelineError::ConfigError(format!(
                "iou_threshold must be in [0, 1], got {}",
                self.iou_threshold
            )));
        }
        Ok(())
    }
}

/// Which overlays to draw onto each output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DrawOptions {
    /// Draw body joints.
    pub keypoints: bool,
    /// Draw limbs between joints.
    pub limbs: bool,
    /// Draw track bounding boxes.
    pub bbox: bool,
    /// Label each drawn box with its track id. Ignored unless `bbox` is set.
    pub ids: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            keypoints: true,
            limbs: true,
            bbox: true,
            ids: true,
        }
    }
}

impl DrawOptions {
    /// Options with every overlay disabled; frames pass through untouched.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            keypoints: false,
            limbs: false,
            bbox: false,
            ids: false,
        }
    }

    /// Whether at least one overlay will be drawn.
    ///
    /// Id labels sit on the boxes, so `ids` alone does not count.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.keypoints || self.limbs || self.bbox
    }
}

/// Configuration for one video processing run.
///
/// # Example
///
/// ```rust
/// use openpose_tracker::{DrawOptions, RunConfig};
///
/// let config = RunConfig::new()
///     .with_draw(DrawOptions::none())
///     .with_max_frames(Some(100));
/// assert_eq!(config.max_frames, Some(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Overlays to render.
    pub draw: DrawOptions,
    /// Upper bound on processed frames. `None` processes the whole stream.
    pub max_frames: Option<usize>,
}

impl RunConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overlays to render.
    #[must_use]
    pub const fn with_draw(mut self, draw: DrawOptions) -> Self {
        self.draw = draw;
        self
    }

    /// Toggle keypoint drawing.
    #[must_use]
    pub const fn with_draw_keypoints(mut self, enabled: bool) -> Self {
        self.draw.keypoints = enabled;
        self
    }

    /// Toggle limb drawing.
    #[must_use]
    pub const fn with_draw_limbs(mut self, enabled: bool) -> Self {
        self.draw.limbs = enabled;
        self
    }

    /// Toggle bounding box drawing.
    #[must_use]
    pub const fn with_draw_bbox(mut self, enabled: bool) -> Self {
        self.draw.bbox = enabled;
        self
    }

    /// Toggle track id drawing.
    #[must_use]
    pub const fn with_draw_ids(mut self, enabled: bool) -> Self {
        self.draw.ids = enabled;
        self
    }

    /// Set the frame limit.
    #[must_use]
    pub const fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] when `max_frames` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_frames == Some(0) {
            return Err(PipelineError::ConfigError(
                "max_frames must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}
