// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Output artifacts: frame sinks, the track log, and output directory checks.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::tracker::TrackSnapshot;

#[cfg(feature = "video")]
use std::sync::Once;
#[cfg(feature = "video")]
use video_rs::{Encoder, Time, encode::Settings as EncoderSettings};

#[cfg(feature = "video")]
static INIT: Once = Once::new();

/// Initialize `video-rs` once. Safe to call multiple times.
#[allow(clippy::missing_const_for_fn)]
pub fn init_video() {
    #[cfg(feature = "video")]
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::error!("Failed to initialize video-rs: {e}");
        }
    });
}

/// Destination for rendered frames.
pub trait FrameSink {
    /// Append one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written; the run aborts.
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<()>;

    /// Flush and close the sink. Calling it more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if pending data cannot be flushed.
    fn finish(&mut self) -> Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Sink that keeps frames in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    frames: Vec<DynamicImage>,
    finished: bool,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far.
    #[must_use]
    pub fn frames(&self) -> &[DynamicImage] {
        &self.frames
    }

    /// Consume the sink and return its frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<DynamicImage> {
        self.frames
    }

    /// Whether [`FrameSink::finish`] has been called.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<()> {
        if self.finished {
            return Err(PipelineError::WriteError("Sink already finished".to_string()));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// H.264 `yuv420p` MP4 writer backed by `video-rs`.
#[cfg(feature = "video")]
pub struct VideoWriter {
    encoder: Encoder,
    frame_duration: Time,
    position: Time,
    width: usize,
    height: usize,
    finished: bool,
}

#[cfg(feature = "video")]
impl VideoWriter {
    /// Create a writer. The parent directory must already exist.
    ///
    /// # Arguments
    ///
    /// * `path` - Output video path (e.g., "clip_tracked.mp4").
    /// * `width` - Frame width.
    /// * `height` - Frame height.
    /// * `fps` - Frames per second.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WriteError`] if the encoder cannot be created.
    pub fn new<P: AsRef<Path>>(path: P, width: usize, height: usize, fps: f32) -> Result<Self> {
        init_video();
        let path = path.as_ref();

        if !fps.is_finite() || fps <= 0.0 {
            return Err(PipelineError::WriteError(format!("Invalid frame rate {fps}")));
        }

        let settings = EncoderSettings::preset_h264_yuv420p(width, height, false);
        let encoder = Encoder::new(path, settings).map_err(|e| {
            PipelineError::WriteError(format!("Failed to create encoder for {}: {e}", path.display()))
        })?;

        Ok(Self {
            encoder,
            frame_duration: Time::from_secs_f64(1.0 / f64::from(fps)),
            position: Time::zero(),
            width,
            height,
            finished: false,
        })
    }
}

#[cfg(feature = "video")]
impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<()> {
        let rgb = frame.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);

        if width != self.width || height != self.height {
            return Err(PipelineError::VideoError(format!(
                "Frame dimensions {width}x{height} do not match video dimensions {}x{}",
                self.width, self.height
            )));
        }

        let frame_array = ndarray::Array3::from_shape_vec((height, width, 3), rgb.into_raw())
            .map_err(|e| PipelineError::VideoError(e.to_string()))?;

        self.encoder
            .encode(&frame_array, self.position)
            .map_err(|e| PipelineError::VideoError(format!("Failed to encode frame: {e}")))?;

        self.position = self.position.aligned_with(self.frame_duration).add();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder
            .finish()
            .map_err(|e| PipelineError::VideoError(format!("Failed to finish video encoding: {e}")))
    }
}

/// Tracks reported for one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Zero-based frame index.
    pub frame: usize,
    /// Tracks reported for this frame, sorted by id.
    pub tracks: Vec<TrackSnapshot>,
}

/// One [`FrameRecord`] per processed frame, serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackLog {
    records: Vec<FrameRecord>,
}

impl TrackLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record for the next frame.
    pub fn push(&mut self, record: FrameRecord) {
        self.records.push(record);
    }

    /// All records in frame order.
    #[must_use]
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no frame was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct track ids in order of first appearance.
    #[must_use]
    pub fn track_ids(&self) -> Vec<u64> {
        let mut ids = Vec::new();
        for track in self.records.iter().flat_map(|r| &r.tracks) {
            if !ids.contains(&track.id) {
                ids.push(track.id);
            }
        }
        ids
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SerializationError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the log to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WriteError`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| {
            PipelineError::WriteError(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Read a log written by [`TrackLog::save`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ReadError`] if the file cannot be read and
    /// [`PipelineError::SerializationError`] if it is not a track log.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PipelineError::ReadError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Check that `dir` exists, is a directory, and accepts new files.
///
/// Writability is probed by creating and removing a file.
///
/// # Errors
///
/// Returns [`PipelineError::WriteError`] describing the first failed check.
pub fn validate_output_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();

    if !dir.exists() {
        return Err(PipelineError::WriteError(format!(
            "Output directory does not exist: {}",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(PipelineError::WriteError(format!(
            "Output path is not a directory: {}",
            dir.display()
        )));
    }

    let probe = dir.join(format!(".{}-write-probe-{}", crate::NAME, std::process::id()));
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .map_err(|e| {
            PipelineError::WriteError(format!("Output directory is not writable: {}: {e}", dir.display()))
        })?;
    fs::remove_file(&probe).map_err(|e| {
        PipelineError::WriteError(format!("Failed to remove probe file {}: {e}", probe.display()))
    })
}

/// `(<stem>_tracked.mp4, <stem>_tracks.json)` inside `out_dir`.
#[must_use]
pub fn output_paths(input: &Path, out_dir: &Path) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
    (
        out_dir.join(format!("{stem}_tracked.mp4")),
        out_dir.join(format!("{stem}_tracks.json")),
    )
}
