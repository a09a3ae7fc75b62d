// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame pose detections.
//!
//! A [`Detection`] is one person found in one frame: a fixed array of BODY_25
//! keypoint slots, an optional bounding box, and an aggregate score. All
//! coordinates are in original frame pixels.

use serde::{Deserialize, Serialize};

use crate::utils::calculate_iou;
use crate::visualizer::skeleton::NUM_JOINTS;

/// A single anatomical landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Horizontal position in pixels.
    pub x: f32,
    /// Vertical position in pixels.
    pub y: f32,
    /// Heatmap confidence at the peak.
    pub confidence: f32,
}

impl Keypoint {
    /// Create a new keypoint.
    #[must_use]
    pub const fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }
}

/// Axis-aligned box in `xyxy` format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box from its corners.
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box from center, aspect ratio (`w / h`) and height.
    #[must_use]
    pub fn from_center_aspect(cx: f32, cy: f32, aspect: f32, height: f32) -> Self {
        let width = aspect * height;
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    /// Tight box around the present keypoints, or `None` when there are none.
    #[must_use]
    pub fn from_keypoints(keypoints: &[Option<Keypoint>]) -> Option<Self> {
        keypoints.iter().flatten().fold(None, |acc, kp| {
            Some(match acc {
                None => Self::new(kp.x, kp.y, kp.x, kp.y),
                Some(b) => Self::new(b.x1.min(kp.x), b.y1.min(kp.y), b.x2.max(kp.x), b.y2.max(kp.y)),
            })
        })
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Box area; zero for inverted boxes.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Box center `(cx, cy)`.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection over union with another box.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        calculate_iou(&self.to_array(), &other.to_array())
    }

    /// Corners as `[x1, y1, x2, y2]`.
    #[must_use]
    pub const fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Grow the box by `pad` on every side and clamp it to `width x height`.
    #[must_use]
    pub fn padded(&self, pad: f32, width: f32, height: f32) -> Self {
        Self {
            x1: (self.x1 - pad).clamp(0.0, width),
            y1: (self.y1 - pad).clamp(0.0, height),
            x2: (self.x2 + pad).clamp(0.0, width),
            y2: (self.y2 + pad).clamp(0.0, height),
        }
    }
}

/// One person detected in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// One slot per BODY_25 joint; `None` when the joint was not found.
    pub keypoints: Vec<Option<Keypoint>>,
    /// Explicit bounding box, if the estimator produced one.
    pub bbox: Option<BoundingBox>,
    /// Aggregate person score.
    pub score: f32,
}

impl Detection {
    /// Create a detection from keypoint slots and a score, without a box.
    #[must_use]
    pub const fn new(keypoints: Vec<Option<Keypoint>>, score: f32) -> Self {
        Self {
            keypoints,
            bbox: None,
            score,
        }
    }

    /// Create a box-only detection with all keypoint slots empty.
    #[must_use]
    pub fn from_bbox(bbox: BoundingBox, score: f32) -> Self {
        Self {
            keypoints: vec![None; NUM_JOINTS],
            bbox: Some(bbox),
            score,
        }
    }

    /// Attach an explicit bounding box.
    #[must_use]
    pub const fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// The explicit box, or the tight box around the present keypoints.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox.or_else(|| BoundingBox::from_keypoints(&self.keypoints))
    }

    /// Number of joints that were found.
    #[must_use]
    pub fn num_visible(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_some()).count()
    }
}
