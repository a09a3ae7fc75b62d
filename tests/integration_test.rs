// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Integration tests for the detect-track-render loop.

use std::cell::Cell;
use std::rc::Rc;

use image::{DynamicImage, Rgb, RgbImage};
use openpose_tracker::{
    BoundingBox, DetecTracker, Detection, DrawOptions, FrameSink, MemorySink, PipelineError,
    PoseEstimator, Result, RunConfig, SortTracker, SourceMeta, TrackLog, TrackerConfig,
};

/// Estimator whose output is a function of the frame index.
struct Scripted<F> {
    script: F,
    calls: Rc<Cell<usize>>,
}

impl<F: FnMut(usize) -> Result<Vec<Detection>>> Scripted<F> {
    fn new(script: F) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                script,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl<F: FnMut(usize) -> Result<Vec<Detection>>> PoseEstimator for Scripted<F> {
    fn detect(&mut self, _frame: &DynamicImage) -> Result<Vec<Detection>> {
        let index = self.calls.get();
        self.calls.set(index + 1);
        (self.script)(index)
    }
}

fn nobody(_: usize) -> Result<Vec<Detection>> {
    Ok(Vec::new())
}

fn person_at(x: f32) -> Detection {
    Detection::from_bbox(BoundingBox::new(x, 10.0, x + 20.0, 60.0), 0.9)
}

/// Frames with distinct, non-uniform content.
fn frames(n: usize) -> Vec<Result<(DynamicImage, SourceMeta)>> {
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_possible_truncation)]
            let img = RgbImage::from_fn(96, 72, |x, y| {
                Rgb([(x * 2) as u8, (y * 3) as u8, (i * 17) as u8])
            });
            Ok((DynamicImage::ImageRgb8(img), SourceMeta::new("synthetic.mp4", i)))
        })
        .collect()
}

fn sort_tracker() -> SortTracker {
    SortTracker::new(TrackerConfig::default())
}

fn no_ids() -> RunConfig {
    RunConfig::new().with_draw_ids(false)
}

#[test]
fn test_max_frames_limits_processing() {
    let (estimator, calls) = Scripted::new(nobody);
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let config = no_ids().with_max_frames(Some(4));
    let log = pipeline.process(frames(10), &mut sink, &config).unwrap();

    assert_eq!(log.len(), 4);
    assert_eq!(sink.frames().len(), 4);
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_no_limit_processes_every_frame() {
    let (estimator, _) = Scripted::new(nobody);
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let log = pipeline.process(frames(7), &mut sink, &no_ids()).unwrap();
    assert_eq!(log.len(), 7);
    assert_eq!(sink.frames().len(), 7);

    let indices: Vec<usize> = log.records().iter().map(|r| r.frame).collect();
    assert_eq!(indices, (0..7).collect::<Vec<_>>());
}

#[test]
fn test_no_detections_yield_empty_records() {
    let (estimator, _) = Scripted::new(nobody);
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let log = pipeline.process(frames(6), &mut sink, &no_ids()).unwrap();
    assert_eq!(log.len(), 6);
    assert!(log.records().iter().all(|r| r.tracks.is_empty()));
    assert!(log.track_ids().is_empty());
}

#[test]
fn test_draw_off_runs_are_deterministic() {
    let run = || -> String {
        let (estimator, _) = Scripted::new(|i| Ok(vec![person_at(5.0 + i as f32), person_at(60.0)]));
        let mut pipeline = DetecTracker::new(estimator, sort_tracker());
        let mut sink = MemorySink::new();
        let config = RunConfig::new().with_draw(DrawOptions::none());
        pipeline.process(frames(8), &mut sink, &config).unwrap().to_json().unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert!(first.contains("\"id\": 1"));
}

#[test]
fn test_draw_off_passes_frames_through() {
    let (estimator, _) = Scripted::new(|_| Ok(vec![person_at(10.0)]));
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let input = frames(5);
    let expected: Vec<DynamicImage> = input.iter().map(|f| f.as_ref().unwrap().0.clone()).collect();

    let config = RunConfig::new().with_draw(DrawOptions::none());
    pipeline.process(input, &mut sink, &config).unwrap();
    assert_eq!(sink.frames(), expected.as_slice());
}

#[test]
fn test_id_labels_alone_pass_frames_through() {
    let (estimator, _) = Scripted::new(|_| Ok(vec![person_at(10.0), person_at(60.0)]));
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let input = frames(3);
    let expected: Vec<DynamicImage> = input.iter().map(|f| f.as_ref().unwrap().0.clone()).collect();

    // ids keep their default; labels belong to boxes and boxes are off
    let config = RunConfig::new()
        .with_draw_keypoints(false)
        .with_draw_limbs(false)
        .with_draw_bbox(false);
    assert!(config.draw.ids);

    let log = pipeline.process(input, &mut sink, &config).unwrap();
    assert!(log.records().iter().all(|r| r.tracks.len() == 2));
    assert_eq!(sink.frames(), expected.as_slice());
}

#[test]
fn test_empty_frames_with_detections() {
    let (estimator, _) = Scripted::new(|_| Ok(vec![person_at(10.0)]));
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let input: Vec<Result<(DynamicImage, SourceMeta)>> = (0..2)
        .map(|i| Ok((DynamicImage::new_rgb8(0, 0), SourceMeta::new("empty.mp4", i))))
        .collect();
    let log = pipeline.process(input, &mut sink, &no_ids()).unwrap();

    assert_eq!(log.len(), 2);
    assert_eq!(sink.frames().len(), 2);
    assert!(sink.frames().iter().all(|f| f.width() == 0 && f.height() == 0));
}

#[test]
fn test_overlays_change_frames() {
    let (estimator, _) = Scripted::new(|_| Ok(vec![person_at(10.0)]));
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let input = frames(2);
    let original = input[0].as_ref().unwrap().0.clone();
    pipeline.process(input, &mut sink, &no_ids()).unwrap();
    assert_ne!(sink.frames()[0], original);
}

#[test]
fn test_estimator_error_keeps_frame() {
    let (estimator, _) = Scripted::new(|i| {
        if i == 2 {
            Err(PipelineError::InferenceError("bad output".to_string()))
        } else {
            Ok(vec![person_at(10.0)])
        }
    });
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();

    let log = pipeline.process(frames(5), &mut sink, &no_ids()).unwrap();
    assert_eq!(sink.frames().len(), 5);
    assert_eq!(log.len(), 5);
    assert!(log.records()[2].tracks.is_empty());
    assert!(!log.records()[3].tracks.is_empty());
    // the gap does not break the identity
    assert_eq!(log.records()[3].tracks[0].id, 1);
}

#[test]
fn test_track_ids_unique_and_increasing() {
    // one person walks across, a second arrives at frame 5, the first leaves at frame 10
    let (estimator, _) = Scripted::new(|i| {
        let mut people = Vec::new();
        if i < 10 {
            people.push(person_at(2.0 * i as f32));
        }
        if i >= 5 {
            people.push(person_at(70.0));
        }
        Ok(people)
    });
    let config = TrackerConfig::default().with_min_hits(1).with_max_age(1);
    let mut pipeline = DetecTracker::new(estimator, SortTracker::new(config));
    let mut sink = MemorySink::new();

    let log = pipeline.process(frames(20), &mut sink, &no_ids()).unwrap();

    for record in log.records() {
        let ids: Vec<u64> = record.tracks.iter().map(|t| t.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "frame {}: {ids:?}", record.frame);
    }
    let ids = log.track_ids();
    assert_eq!(ids, vec![1, 2]);
    assert!(log.records()[15].tracks.iter().all(|t| t.id == 2));
}

struct FailingSink {
    written: usize,
    finished: bool,
}

impl FrameSink for FailingSink {
    fn write_frame(&mut self, _frame: &DynamicImage) -> Result<()> {
        if self.written == 2 {
            return Err(PipelineError::WriteError("disk full".to_string()));
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[test]
fn test_sink_error_aborts_and_finishes() {
    let (estimator, calls) = Scripted::new(nobody);
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = FailingSink {
        written: 0,
        finished: false,
    };

    let err = pipeline.process(frames(6), &mut sink, &no_ids()).unwrap_err();
    assert!(matches!(err, PipelineError::WriteError(_)));
    assert!(sink.finished);
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_log_round_trips_through_file() {
    let (estimator, _) = Scripted::new(|_| Ok(vec![person_at(10.0), person_at(60.0)]));
    let mut pipeline = DetecTracker::new(estimator, sort_tracker());
    let mut sink = MemorySink::new();
    let log = pipeline.process(frames(4), &mut sink, &no_ids()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip_tracks.json");
    log.save(&path).unwrap();
    assert_eq!(TrackLog::load(&path).unwrap(), log);
}

#[test]
fn test_bad_output_dir_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    assert!(matches!(
        openpose_tracker::io::validate_output_dir(&missing).unwrap_err(),
        PipelineError::WriteError(_)
    ));
    assert!(!missing.exists());
}

#[cfg(unix)]
#[test]
fn test_read_only_output_dir_rejected() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let locked = dir.path().join("locked");
    std::fs::create_dir(&locked).unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

    let result = openpose_tracker::io::validate_output_dir(&locked);
    let writable_anyway = result.is_ok();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    // permission bits do not apply to root
    if !writable_anyway {
        assert!(matches!(result.unwrap_err(), PipelineError::WriteError(_)));
    }
    assert_eq!(std::fs::read_dir(&locked).unwrap().count(), 0);
}

#[cfg(feature = "video")]
mod video {
    use super::*;
    use openpose_tracker::{VideoReader, VideoWriter};

    fn write_clip(path: &std::path::Path, n: usize) {
        let mut writer = VideoWriter::new(path, 96, 72, 10.0).unwrap();
        for frame in frames(n) {
            writer.write_frame(&frame.unwrap().0).unwrap();
        }
        writer.finish().unwrap();
    }

    fn decoded_frames(path: &std::path::Path) -> usize {
        VideoReader::open(path).unwrap().filter(|f| f.is_ok()).count()
    }

    #[test]
    fn test_run_on_video_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("walk.mp4");
        write_clip(&input, 8);

        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let (estimator, _) = Scripted::new(|_| Ok(vec![person_at(10.0)]));
        let mut pipeline = DetecTracker::new(estimator, sort_tracker());
        let output = pipeline
            .run_on_video(&input, &out, &no_ids().with_max_frames(Some(3)))
            .unwrap();

        assert_eq!(output.frames, 3);
        assert_eq!(output.video_path, out.join("walk_tracked.mp4"));
        assert_eq!(output.tracks_path, out.join("walk_tracks.json"));
        assert_eq!(decoded_frames(&output.video_path), 3);
        assert_eq!(TrackLog::load(&output.tracks_path).unwrap().len(), 3);
    }

    #[test]
    fn test_run_on_video_without_limit_keeps_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("walk.mp4");
        write_clip(&input, 8);
        assert_eq!(decoded_frames(&input), 8);

        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let (estimator, calls) = Scripted::new(nobody);
        let mut pipeline = DetecTracker::new(estimator, sort_tracker());
        let output = pipeline.run_on_video(&input, &out, &no_ids()).unwrap();

        assert_eq!(output.frames, 8);
        assert_eq!(calls.get(), 8);
        assert_eq!(decoded_frames(&output.video_path), 8);
        assert_eq!(TrackLog::load(&output.tracks_path).unwrap().len(), 8);
    }

    #[test]
    fn test_missing_output_dir_fails_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("walk.mp4");
        write_clip(&input, 4);

        let (estimator, calls) = Scripted::new(nobody);
        let mut pipeline = DetecTracker::new(estimator, sort_tracker());
        let err = pipeline
            .run_on_video(&input, dir.path().join("missing"), &no_ids())
            .unwrap_err();

        assert!(matches!(err, PipelineError::WriteError(_)));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_missing_input_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let (estimator, calls) = Scripted::new(nobody);
        let mut pipeline = DetecTracker::new(estimator, sort_tracker());
        let err = pipeline
            .run_on_video(dir.path().join("none.mp4"), dir.path(), &no_ids())
            .unwrap_err();

        assert!(matches!(err, PipelineError::ReadError(_)));
        assert_eq!(calls.get(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
