// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose estimator capability.

use image::DynamicImage;

use crate::detection::Detection;
use crate::error::Result;

/// Anything that can find people in a frame.
///
/// The pipeline only talks to estimators through this trait, so a different
/// network (or a test stub) can be dropped in without touching the loop.
pub trait PoseEstimator {
    /// Detect every person in `frame`.
    ///
    /// Coordinates of the returned detections are in `frame` pixels.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame cannot be processed; the pipeline
    /// logs it and treats the frame as empty.
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>>;
}

impl<E: PoseEstimator + ?Sized> PoseEstimator for &mut E {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}

impl<E: PoseEstimator + ?Sized> PoseEstimator for Box<E> {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}

#[cfg(feature = "onnx")]
impl PoseEstimator for crate::model::OpenPoseModel {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>> {
        self.detect_image(frame)
    }
}
