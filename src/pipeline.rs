// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detect, track, render and write, one frame at a time.
//!
//! [`DetecTracker`] owns a [`PoseEstimator`] and a [`Tracker`] and drives
//! them over a stream of frames. [`DetecTracker::process`] is the core loop
//! over any frame iterator and [`FrameSink`]; [`DetecTracker::run_on_video`]
//! wires it to a video file and writes `<stem>_tracked.mp4` plus
//! `<stem>_tracks.json`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;

use crate::annotate::draw_tracks;
use crate::config::RunConfig;
use crate::error::Result;
use crate::estimator::PoseEstimator;
use crate::io::{FrameRecord, FrameSink, TrackLog};
use crate::source::SourceMeta;
use crate::tracker::Tracker;
use crate::utils::count_label;
use crate::{verbose, warn};

/// Artifacts of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Annotated video.
    pub video_path: PathBuf,
    /// JSON track log.
    pub tracks_path: PathBuf,
    /// Number of processed frames.
    pub frames: usize,
}

/// Pose estimator plus tracker, driven frame by frame.
///
/// # Example
///
#[cfg_attr(feature = "onnx", doc = "```no_run")]
#[cfg_attr(not(feature = "onnx"), doc = "```ignore")]
/// use openpose_tracker::{DetecTracker, OpenPoseModel, PoseConfig, RunConfig, SortTracker, TrackerConfig};
///
/// let model = OpenPoseModel::load("weights/openpose_body25.onnx", PoseConfig::default())?;
/// let mut pipeline = DetecTracker::new(model, SortTracker::new(TrackerConfig::default()));
/// let output = pipeline.run_on_video("walk.mp4", "runs/track/run", &RunConfig::default())?;
/// println!("{}", output.tracks_path.display());
/// # Ok::<(), openpose_tracker::PipelineError>(())
/// ```
#[derive(Debug)]
pub struct DetecTracker<E, T> {
    estimator: E,
    tracker: T,
}

impl<E: PoseEstimator, T: Tracker> DetecTracker<E, T> {
    /// Combine an estimator and a tracker.
    #[must_use]
    pub const fn new(estimator: E, tracker: T) -> Self {
        Self { estimator, tracker }
    }

    /// The pose estimator.
    #[must_use]
    pub const fn estimator(&self) -> &E {
        &self.estimator
    }

    /// The tracker.
    #[must_use]
    pub const fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Split back into estimator and tracker.
    #[must_use]
    pub fn into_parts(self) -> (E, T) {
        (self.estimator, self.tracker)
    }

    /// Run the loop over `frames`, writing every processed frame to `sink`.
    ///
    /// The sink is finished before returning, also when the loop fails.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PipelineError::ConfigError`] for an invalid `config`
    /// and propagates sink errors. Per-frame detection and tracking failures
    /// are logged and recorded as empty frames instead.
    pub fn process<I, S>(&mut self, frames: I, sink: &mut S, config: &RunConfig) -> Result<TrackLog>
    where
        I: IntoIterator<Item = Result<(DynamicImage, SourceMeta)>>,
        S: FrameSink + ?Sized,
    {
        config.validate()?;

        let start = Instant::now();
        let looped = self.run_loop(frames, sink, config);
        let finished = sink.finish();
        let log = looped?;
        finished?;

        #[allow(clippy::cast_precision_loss)]
        let per_frame = start.elapsed().as_secs_f64() * 1000.0 / log.len().max(1) as f64;
        verbose!(
            "Processed {}, {} tracked, {per_frame:.1}ms per frame",
            count_label(log.len(), "frame"),
            count_label(log.track_ids().len(), "person")
        );
        Ok(log)
    }

    fn run_loop<I, S>(&mut self, frames: I, sink: &mut S, config: &RunConfig) -> Result<TrackLog>
    where
        I: IntoIterator<Item = Result<(DynamicImage, SourceMeta)>>,
        S: FrameSink + ?Sized,
    {
        let limit = config.max_frames.unwrap_or(usize::MAX);
        let mut log = TrackLog::new();

        for (index, item) in frames.into_iter().take(limit).enumerate() {
            let (frame, meta) = match item {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Stopping at frame {}: {e}", index + 1);
                    break;
                }
            };

            let start = Instant::now();
            let detections = match self.estimator.detect(&frame) {
                Ok(detections) => detections,
                Err(e) => {
                    warn!("Frame {} skipped: {e}", index + 1);
                    Vec::new()
                }
            };
            let tracks = match self.tracker.update(&detections) {
                Ok(tracks) => tracks,
                Err(e) => {
                    warn!("Frame {} not tracked: {e}", index + 1);
                    Vec::new()
                }
            };
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let rendered = if config.draw.any() {
                draw_tracks(&frame, &tracks, &config.draw)
            } else {
                frame
            };
            sink.write_frame(&rendered)?;

            let total = meta
                .total_frames
                .or(config.max_frames)
                .map_or_else(|| "?".to_string(), |n| n.min(limit).to_string());
            verbose!(
                "video 1/1 (frame {}/{total}) {}: {}, {elapsed_ms:.1}ms",
                index + 1,
                meta.path,
                count_label(tracks.len(), "person")
            );

            log.push(FrameRecord { frame: index, tracks });
        }

        Ok(log)
    }

    /// Track people through a video file.
    ///
    /// Checks run in order: the input is opened, `out_dir` is validated, and
    /// the video writer is created. Nothing is written into `out_dir` before
    /// all three succeed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PipelineError::ReadError`] if the video cannot be opened,
    /// [`crate::PipelineError::WriteError`] if `out_dir` or an artifact cannot be
    /// written, and [`crate::PipelineError::FeatureNotEnabled`] without the
    /// `video` feature.
    pub fn run_on_video<P, Q>(&mut self, path: P, out_dir: Q, config: &RunConfig) -> Result<RunOutput>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        config.validate()?;

        #[cfg(feature = "video")]
        {
            use crate::io::{VideoWriter, output_paths, validate_output_dir};
            use crate::source::VideoReader;

            let path = path.as_ref();
            let out_dir = out_dir.as_ref();

            let reader = VideoReader::open(path)?;
            validate_output_dir(out_dir)?;
            let (video_path, tracks_path) = output_paths(path, out_dir);
            let (width, height) = reader.size();
            let mut writer = VideoWriter::new(&video_path, width as usize, height as usize, reader.fps())?;

            crate::section!("Tracking {}", path.display());
            let log = self.process(reader, &mut writer, config)?;
            log.save(&tracks_path)?;

            Ok(RunOutput {
                video_path,
                tracks_path,
                frames: log.len(),
            })
        }

        #[cfg(not(feature = "video"))]
        {
            let _ = (path, out_dir);
            Err(crate::PipelineError::FeatureNotEnabled(
                "Video support requires the 'video' feature".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, Detection};
    use crate::error::PipelineError;
    use crate::io::MemorySink;
    use crate::config::TrackerConfig;
    use crate::tracker::{SortTracker, TrackSnapshot};

    struct StaticPerson;

    impl PoseEstimator for StaticPerson {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<Vec<Detection>> {
            Ok(vec![Detection::from_bbox(BoundingBox::new(4.0, 4.0, 20.0, 28.0), 0.9)])
        }
    }

    struct FailingTracker;

    impl Tracker for FailingTracker {
        fn update(&mut self, _detections: &[Detection]) -> Result<Vec<TrackSnapshot>> {
            Err(PipelineError::TrackingError("singular".to_string()))
        }
    }

    fn frames(n: usize) -> Vec<Result<(DynamicImage, SourceMeta)>> {
        (0..n)
            .map(|i| Ok((DynamicImage::new_rgb8(32, 32), SourceMeta::new("clip.mp4", i))))
            .collect()
    }

    #[test]
    fn test_process_tracks_static_person() {
        let mut pipeline = DetecTracker::new(StaticPerson, SortTracker::new(TrackerConfig::default()));
        let mut sink = MemorySink::new();
        let config = RunConfig::new().with_draw_ids(false);
        let log = pipeline.process(frames(5), &mut sink, &config).unwrap();

        assert_eq!(log.len(), 5);
        assert!(log.records().iter().all(|r| r.tracks.len() == 1 && r.tracks[0].id == 1));
        assert_eq!(sink.frames().len(), 5);
        assert!(sink.is_finished());
    }

    #[test]
    fn test_tracking_error_records_empty_frame() {
        let mut pipeline = DetecTracker::new(StaticPerson, FailingTracker);
        let mut sink = MemorySink::new();
        let log = pipeline.process(frames(3), &mut sink, &RunConfig::default()).unwrap();

        assert_eq!(log.len(), 3);
        assert!(log.records().iter().all(|r| r.tracks.is_empty()));
        assert_eq!(sink.frames().len(), 3);
    }

    #[test]
    fn test_decode_error_ends_stream() {
        let mut input = frames(2);
        input.push(Err(PipelineError::ImageError("corrupt packet".to_string())));
        input.extend(frames(2));

        let mut pipeline = DetecTracker::new(StaticPerson, SortTracker::new(TrackerConfig::default()));
        let mut sink = MemorySink::new();
        let log = pipeline.process(input, &mut sink, &RunConfig::new().with_draw_ids(false)).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(sink.frames().len(), 2);
    }

    #[test]
    fn test_zero_max_frames_rejected() {
        let mut pipeline = DetecTracker::new(StaticPerson, SortTracker::new(TrackerConfig::default()));
        let mut sink = MemorySink::new();
        let config = RunConfig::new().with_max_frames(Some(0));
        let err = pipeline.process(frames(2), &mut sink, &config).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert!(sink.frames().is_empty());
    }

    #[cfg(not(feature = "video"))]
    #[test]
    fn test_run_on_video_requires_feature() {
        let mut pipeline = DetecTracker::new(StaticPerson, SortTracker::new(TrackerConfig::default()));
        let err = pipeline
            .run_on_video("clip.mp4", ".", &RunConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::FeatureNotEnabled(_)));
    }
}
