// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Video input.
//!
//! [`VideoReader`] (feature `video`) decodes a file with FFmpeg and yields
//! `(frame, meta)` pairs, the item type the pipeline consumes. Any iterator of
//! the same item type can stand in for it, which is how tests feed frames.

use image::DynamicImage;
use ndarray::Array3;

use crate::error::{PipelineError, Result};

/// Metadata about a decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    /// Zero-based frame index.
    pub frame_idx: usize,
    /// Estimated total frame count, when the container reports a duration.
    pub total_frames: Option<usize>,
    /// Source path.
    pub path: String,
    /// Frames per second.
    pub fps: Option<f32>,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            frame_idx: 0,
            total_frames: None,
            path: String::new(),
            fps: None,
        }
    }
}

impl SourceMeta {
    /// Metadata for frame `frame_idx` of `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, frame_idx: usize) -> Self {
        Self {
            frame_idx,
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Convert an HWC RGB array into an image.
///
/// # Errors
///
/// Returns [`PipelineError::ImageError`] if the array is not `H x W x 3`.
pub fn frame_to_image(frame: &Array3<u8>) -> Result<DynamicImage> {
    let &[height, width, channels] = frame.shape() else {
        return Err(PipelineError::ImageError("Frame is not three-dimensional".to_string()));
    };
    if channels != 3 {
        return Err(PipelineError::ImageError(format!(
            "Expected 3 channels, got {channels}"
        )));
    }
    let height = u32::try_from(height)
        .map_err(|_| PipelineError::ImageError("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(width)
        .map_err(|_| PipelineError::ImageError("Frame width exceeds u32::MAX".to_string()))?;

    let raw: Vec<u8> = frame.iter().copied().collect();
    let buffer = image::RgbImage::from_raw(width, height, raw)
        .ok_or_else(|| PipelineError::ImageError("Failed to create image from frame".to_string()))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

/// FFmpeg-backed frame iterator over a video file.
#[cfg(feature = "video")]
pub struct VideoReader {
    decoder: video_rs::decode::Decoder,
    path: String,
    current_frame: usize,
    total_frames: Option<usize>,
    fps: f32,
    finished: bool,
}

#[cfg(feature = "video")]
impl VideoReader {
    /// Open a video file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ReadError`] if the file is missing or FFmpeg
    /// cannot open it.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        crate::io::init_video();

        if !path.is_file() {
            return Err(PipelineError::ReadError(format!(
                "Video not found: {}",
                path.display()
            )));
        }

        let decoder = video_rs::decode::Decoder::new(path).map_err(|e| {
            PipelineError::ReadError(format!("Failed to open {}: {e}", path.display()))
        })?;

        let fps = decoder.frame_rate();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let total_frames = decoder.duration().ok().and_then(|duration| {
            let frames = duration.as_secs_f64() * f64::from(fps);
            (frames.is_finite() && frames > 0.0).then(|| frames.round() as usize)
        });

        Ok(Self {
            decoder,
            path: path.to_string_lossy().to_string(),
            current_frame: 0,
            total_frames,
            fps,
            finished: false,
        })
    }

    /// Frame size as `(width, height)`.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.decoder.size()
    }

    /// Frames per second reported by the container.
    #[must_use]
    pub const fn fps(&self) -> f32 {
        self.fps
    }

    /// Estimated total frame count.
    #[must_use]
    pub const fn total_frames(&self) -> Option<usize> {
        self.total_frames
    }
}

#[cfg(feature = "video")]
impl Iterator for VideoReader {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.decoder.decode() {
            Ok((_ts, frame)) => {
                let meta = SourceMeta {
                    frame_idx: self.current_frame,
                    total_frames: self.total_frames,
                    path: self.path.clone(),
                    fps: Some(self.fps),
                };
                self.current_frame += 1;
                Some(frame_to_image(&frame).map(|img| (img, meta)))
            }
            Err(video_rs::Error::DecodeExhausted | video_rs::Error::ReadExhausted) => {
                self.finished = true;
                None
            }
            Err(e) => {
                // a broken packet mid-stream ends the run like a normal EOF
                crate::warn!(
                    "Stopping at frame {} of {}: {e}",
                    self.current_frame,
                    self.path
                );
                self.finished = true;
                None
            }
        }
    }
}
