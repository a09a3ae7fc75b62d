// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # OpenPose Tracker
//!
//! Multi-person pose tracking over video. Every frame is run through an
//! OpenPose BODY_25 network, people are assembled from part-affinity fields,
//! and a tracker links them into persistent identities. The result is an
//! annotated video plus a JSON log of every track in every frame.
//!
//! ## Quick Start (Library)
//!
#![cfg_attr(feature = "onnx", doc = "```no_run")]
#![cfg_attr(not(feature = "onnx"), doc = "```ignore")]
//! use openpose_tracker::{
//!     DetecTracker, OpenPoseModel, PoseConfig, RunConfig, SortTracker, TrackerConfig,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = OpenPoseModel::load("weights/openpose_body25.onnx", PoseConfig::default())?;
//!     let tracker = SortTracker::new(TrackerConfig::default());
//!     let mut pipeline = DetecTracker::new(model, tracker);
//!
//!     let config = RunConfig::new().with_max_frames(Some(300));
//!     let output = pipeline.run_on_video("walk.mp4", "runs/track", &config)?;
//!     println!("{} -> {}", output.video_path.display(), output.tracks_path.display());
//!     Ok(())
//! }
//! ```
//!
//! Any [`PoseEstimator`] and [`Tracker`] can be combined, and
//! [`DetecTracker::process`] runs over any frame iterator and [`FrameSink`]:
//!
//! ```rust
//! use image::DynamicImage;
//! use openpose_tracker::{
//!     DetecTracker, Detection, DrawOptions, MemorySink, PoseEstimator, RunConfig, SortTracker,
//!     SourceMeta, TrackerConfig,
//! };
//!
//! struct Nobody;
//!
//! impl PoseEstimator for Nobody {
//!     fn detect(&mut self, _frame: &DynamicImage) -> openpose_tracker::Result<Vec<Detection>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let frames = (0..3).map(|i| {
//!     Ok::<_, openpose_tracker::PipelineError>((DynamicImage::new_rgb8(64, 48), SourceMeta::new("clip", i)))
//! });
//! let mut pipeline = DetecTracker::new(Nobody, SortTracker::new(TrackerConfig::default()));
//! let mut sink = MemorySink::new();
//! let config = RunConfig::new().with_draw(DrawOptions::none());
//!
//! let log = pipeline.process(frames, &mut sink, &config)?;
//! assert_eq!(log.len(), 3);
//! # Ok::<(), openpose_tracker::PipelineError>(())
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! openpose-tracker --source walk.mp4
//! openpose-tracker -s walk.mp4 -o out/ --max-frames 100 --draw-ids false
//! openpose-tracker -s walk.mp4 --weights-url https://example.com/openpose_body25.onnx
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | [`DetecTracker`] orchestration loop and [`RunOutput`] |
//! | [`estimator`] | [`PoseEstimator`] trait |
//! | `model` | [`OpenPoseModel`] ONNX Runtime estimator (feature `onnx`) |
//! | [`preprocessing`] | Frame resizing and tensor layout |
//! | [`postprocessing`] | Peak finding, PAF scoring and person assembly |
//! | [`tracker`] | [`Tracker`] trait, [`SortTracker`], Kalman filter and assignment |
//! | [`annotate`] | Track overlays |
//! | [`io`] | [`FrameSink`]s, [`TrackLog`] and output checks |
//! | [`source`] | Video decoding (feature `video`) |
//! | [`config`] | Builder-style configuration |
//! | [`error`] | [`PipelineError`] and [`Result`] |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `onnx` | ONNX Runtime BODY_25 estimator |
//! | `video` | FFmpeg video decoding and H.264 encoding |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod annotate;
pub mod cli;
pub mod config;
pub mod detection;
pub mod download;
pub mod error;
pub mod estimator;
pub mod io;
#[cfg(feature = "onnx")]
pub mod model;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod source;
pub mod tracker;
pub mod utils;
pub mod visualizer;

// Re-export main types for convenience
pub use config::{DrawOptions, PoseConfig, RunConfig, TensorLayout, TrackerConfig};
pub use detection::{BoundingBox, Detection, Keypoint};
pub use error::{PipelineError, Result};
pub use estimator::PoseEstimator;
pub use io::{FrameRecord, FrameSink, MemorySink, TrackLog};
#[cfg(feature = "onnx")]
pub use model::OpenPoseModel;
pub use pipeline::{DetecTracker, RunOutput};
pub use source::SourceMeta;
pub use tracker::{SortTracker, TrackSnapshot, Tracker};

#[cfg(feature = "video")]
pub use io::VideoWriter;
#[cfg(feature = "video")]
pub use source::VideoReader;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
