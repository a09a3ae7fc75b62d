// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Example script tracking people through a video with the library API.
//!
//! This example covers:
//! 1. Loading the BODY_25 model, downloading it first when a URL is given.
//! 2. Tracking a video into an output directory.
//! 3. Reading the track log back and summarizing it.
//!
//! ```bash
//! cargo run --release --example track_video --features onnx,video -- walk.mp4 [weights-url]
//! ```

use std::path::Path;

use openpose_tracker::download::{DEFAULT_WEIGHTS, ensure_weights};
use openpose_tracker::{
    DetecTracker, OpenPoseModel, PoseConfig, Result, RunConfig, SortTracker, TrackLog,
    TrackerConfig,
};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let video = args.next().unwrap_or_else(|| "video.mp4".to_string());
    let weights_url = args.next();

    if !Path::new(&video).exists() {
        println!("Skipping: '{video}' not found.");
        return Ok(());
    }

    // 1. Load the model
    let weights = ensure_weights(DEFAULT_WEIGHTS, weights_url.as_deref())?;
    let model = OpenPoseModel::load(weights, PoseConfig::default().with_pad_resize(true))?;

    // 2. Track the first 10 seconds at 30 fps
    let out_dir = Path::new("runs/track/example");
    std::fs::create_dir_all(out_dir)?;

    let mut pipeline = DetecTracker::new(model, SortTracker::new(TrackerConfig::default()));
    let config = RunConfig::new().with_max_frames(Some(300));
    let output = pipeline.run_on_video(&video, out_dir, &config)?;

    // 3. Summarize the log
    let log = TrackLog::load(&output.tracks_path)?;
    for id in log.track_ids() {
        let frames = log
            .records()
            .iter()
            .filter(|r| r.tracks.iter().any(|t| t.id == id))
            .count();
        println!("person {id}: visible in {frames} frames");
    }

    println!("\nSaved {} and {}", output.video_path.display(), output.tracks_path.display());
    Ok(())
}
