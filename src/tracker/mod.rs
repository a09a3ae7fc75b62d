// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Multi-person tracking.
//!
//! A [`Tracker`] links per-frame [`Detection`]s into persistent identities and
//! hands back read-only [`TrackSnapshot`]s. [`SortTracker`] is the bundled
//! implementation: a constant-velocity Kalman filter per track with optimal
//! IoU assignment.

pub mod assignment;
pub mod kalman_filter;
mod sort;

use serde::{Deserialize, Serialize};

use crate::detection::{BoundingBox, Detection, Keypoint};
use crate::error::Result;

pub use sort::SortTracker;

/// Read-only copy of a live track after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    /// Identifier, unique within a run.
    pub id: u64,
    /// Filtered box estimate in frame pixels.
    pub bbox: BoundingBox,
    /// Keypoints of the most recent matched detection.
    pub keypoints: Vec<Option<Keypoint>>,
    /// Score of the most recent matched detection.
    pub score: f32,
    /// Frames since the track was created.
    pub age: u32,
    /// Number of detections matched to the track.
    pub hits: u32,
    /// Frames since the last matched detection.
    pub time_since_update: u32,
}

/// Anything that can turn per-frame detections into tracks.
pub trait Tracker {
    /// Feed the detections of the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PipelineError::TrackingError`] when the internal state
    /// cannot be updated. The pipeline records the frame with no tracks.
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackSnapshot>>;
}

impl<T: Tracker + ?Sized> Tracker for &mut T {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackSnapshot>> {
        (**self).update(detections)
    }
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackSnapshot>> {
        (**self).update(detections)
    }
}
