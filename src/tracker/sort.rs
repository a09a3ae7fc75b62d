// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use super::assignment::linear_assignment;
use super::kalman_filter::{KalmanFilter, Measurement, StateCov, StateMean};
use super::{TrackSnapshot, Tracker};
use crate::config::TrackerConfig;
use crate::detection::{BoundingBox, Detection, Keypoint};
use crate::error::Result;

/// Smallest box side fed to the filter, so degenerate boxes keep a valid aspect.
const MIN_SIDE: f32 = 1.0;

/// One live track.
#[derive(Debug, Clone)]
struct Track {
    id: u64,
    mean: StateMean,
    covariance: StateCov,
    keypoints: Vec<Option<Keypoint>>,
    score: f32,
    age: u32,
    hits: u32,
    time_since_update: u32,
}

impl Track {
    fn bbox(&self) -> BoundingBox {
        BoundingBox::from_center_aspect(self.mean[0], self.mean[1], self.mean[2], self.mean[3])
    }

    fn is_finite(&self) -> bool {
        self.mean.iter().all(|v| v.is_finite())
    }

    fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            bbox: self.bbox(),
            keypoints: self.keypoints.clone(),
            score: self.score,
            age: self.age,
            hits: self.hits,
            time_since_update: self.time_since_update,
        }
    }
}

/// `[cx, cy, aspect, h]` for a box.
fn to_measurement(bbox: &BoundingBox) -> Measurement {
    let (cx, cy) = bbox.center();
    let w = bbox.width().max(MIN_SIDE);
    let h = bbox.height().max(MIN_SIDE);
    Measurement::new(cx, cy, w / h, h)
}

/// SORT-style tracker: Kalman prediction plus Hungarian IoU matching.
///
/// # Example
///
/// ```
/// use openpose_tracker::{BoundingBox, Detection, SortTracker, Tracker, TrackerConfig};
///
/// let mut tracker = SortTracker::new(TrackerConfig::default());
/// let person = Detection::from_bbox(BoundingBox::new(10.0, 10.0, 50.0, 120.0), 0.9);
/// let tracks = tracker.update(&[person])?;
/// assert_eq!(tracks[0].id, 1);
/// # Ok::<(), openpose_tracker::PipelineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SortTracker {
    config: TrackerConfig,
    kalman: KalmanFilter,
    tracks: Vec<Track>,
    frame_count: u32,
    next_id: u64,
}

impl SortTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            kalman: KalmanFilter::default(),
            tracks: Vec::new(),
            frame_count: 0,
            next_id: 1,
        }
    }

    /// Tracker configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of live tracks, including ones not reported this frame.
    #[must_use]
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Frames seen so far.
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn create_track(&mut self, bbox: &BoundingBox, detection: &Detection) {
        let (mean, covariance) = self.kalman.initiate(&to_measurement(bbox));
        self.tracks.push(Track {
            id: self.next_id,
            mean,
            covariance,
            keypoints: detection.keypoints.clone(),
            score: detection.score,
            age: 0,
            hits: 1,
            time_since_update: 0,
        });
        self.next_id += 1;
    }

    /// Match detection boxes to tracks, returning `(track, detection)` pairs.
    fn associate(&self, boxes: &[(usize, BoundingBox)]) -> Vec<(usize, usize)> {
        if self.tracks.is_empty() || boxes.is_empty() {
            return Vec::new();
        }

        let predicted: Vec<BoundingBox> = self.tracks.iter().map(Track::bbox).collect();
        let cost: Vec<Vec<f32>> = predicted
            .iter()
            .map(|p| boxes.iter().map(|(_, b)| 1.0 - p.iou(b)).collect())
            .collect();

        linear_assignment(&cost)
            .into_iter()
            .filter(|&(t, d)| predicted[t].iou(&boxes[d].1) >= self.config.iou_threshold)
            .collect()
    }
}

impl Tracker for SortTracker {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackSnapshot>> {
        self.frame_count += 1;

        for track in &mut self.tracks {
            self.kalman.predict(&mut track.mean, &mut track.covariance);
            track.age += 1;
            track.time_since_update += 1;
        }
        self.tracks.retain(Track::is_finite);

        let boxes: Vec<(usize, BoundingBox)> = detections
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.bounding_box().map(|b| (i, b)))
            .collect();

        let matches = self.associate(&boxes);
        let mut matched = vec![false; boxes.len()];

        for &(t, d) in &matches {
            let (det_idx, bbox) = boxes[d];
            let detection = &detections[det_idx];
            let track = &mut self.tracks[t];
            let measurement = to_measurement(&bbox);
            if let Err(e) = self.kalman.update(&mut track.mean, &mut track.covariance, &measurement) {
                crate::warn!("Track {} restarted from its detection: {e}", track.id);
                (track.mean, track.covariance) = self.kalman.initiate(&measurement);
            }
            track.keypoints.clone_from(&detection.keypoints);
            track.score = detection.score;
            track.hits += 1;
            track.time_since_update = 0;
            matched[d] = true;
        }

        for (d, &(det_idx, bbox)) in boxes.iter().enumerate() {
            if !matched[d] {
                self.create_track(&bbox, &detections[det_idx]);
            }
        }

        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.time_since_update <= max_age);

        let warming_up = self.frame_count <= self.config.min_hits;
        let mut snapshots: Vec<TrackSnapshot> = self
            .tracks
            .iter()
            .filter(|t| t.time_since_update == 0 && (warming_up || t.hits >= self.config.min_hits))
            .map(Track::snapshot)
            .collect();
        snapshots.sort_by_key(|s| s.id);
        Ok(snapshots)
    }
}
