// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::{Path, PathBuf};

use crate::cli::args::Cli;
use crate::cli::logging::set_verbose;
use crate::error::{PipelineError, Result};
use crate::pipeline::RunOutput;
use crate::utils::find_next_run_dir;
use crate::{info, verbose};

/// Parent of the default output directories.
const RUNS_DIR: &str = "runs/track";

/// Pick the output directory: the one given, or a fresh `run{N}` under `runs_dir`.
///
/// Only the default directory is created; a given one must already exist.
/// The flag tells whether the directory was created here.
fn resolve_output_dir(output: Option<&PathBuf>, runs_dir: &Path) -> Result<(PathBuf, bool)> {
    if let Some(dir) = output {
        return Ok((dir.clone(), false));
    }

    let dir = find_next_run_dir(runs_dir, "run");
    std::fs::create_dir_all(&dir).map_err(|e| {
        PipelineError::WriteError(format!("Failed to create {}: {e}", dir.display()))
    })?;
    Ok((dir, true))
}

/// Run `f` in the resolved output directory.
///
/// A directory created for this run is removed again when `f` fails and left
/// nothing in it.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
fn with_output_dir<T, F>(output: Option<&PathBuf>, runs_dir: &Path, f: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let (dir, created) = resolve_output_dir(output, runs_dir)?;
    let result = f(&dir);
    if result.is_err() && created {
        // remove_dir refuses non-empty directories
        let _ = std::fs::remove_dir(&dir);
    }
    result
}

/// Run the tracker as configured by the command line.
///
/// # Errors
///
/// Returns the first configuration, weights, input or output error.
pub fn run_tracking(args: &Cli) -> Result<RunOutput> {
    set_verbose(args.verbose);

    let pose_config = args.pose_config();
    let tracker_config = args.tracker_config();
    let run_config = args.run_config();
    pose_config.validate()?;
    tracker_config.validate()?;
    run_config.validate()?;

    if !args.source.is_file() {
        return Err(PipelineError::ReadError(format!(
            "Video not found: {}",
            args.source.display()
        )));
    }

    let weights = crate::download::ensure_weights(&args.weights, args.weights_url.as_deref())?;

    #[cfg(feature = "onnx")]
    {
        use crate::model::OpenPoseModel;
        use crate::pipeline::DetecTracker;
        use crate::tracker::SortTracker;

        let model = OpenPoseModel::load(&weights, pose_config)?;
        info!(
            "{} {} 🚀 Rust ONNX CPU, input {}x{}",
            crate::NAME,
            crate::VERSION,
            model.config().input_res,
            model.config().input_res
        );
        verbose!("Loaded {} (input '{}')", weights.display(), model.input_name());

        let mut pipeline = DetecTracker::new(model, SortTracker::new(tracker_config));
        let output = with_output_dir(args.output.as_ref(), Path::new(RUNS_DIR), |out_dir| {
            pipeline.run_on_video(&args.source, out_dir, &run_config)
        })?;

        crate::success!(
            "{} frames tracked, results saved to {}",
            output.frames,
            output
                .video_path
                .parent()
                .map_or_else(|| ".".into(), |p| p.display().to_string())
        );
        verbose!("  video:  {}", output.video_path.display());
        verbose!("  tracks: {}", output.tracks_path.display());
        Ok(output)
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = (weights, tracker_config, RUNS_DIR);
        info!("{} {}", crate::NAME, crate::VERSION);
        verbose!("Rebuild with `--features onnx,video` to run the BODY_25 model");
        Err(PipelineError::FeatureNotEnabled(
            "Pose estimation requires the 'onnx' feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_missing_source_is_read_error() {
        let args = Cli::parse_from(["app", "--source", "no_such_video.mp4", "--verbose", "false"]);
        assert!(matches!(
            run_tracking(&args).unwrap_err(),
            PipelineError::ReadError(_)
        ));
    }

    #[test]
    fn test_invalid_flags_rejected_first() {
        let args = Cli::parse_from([
            "app",
            "--source",
            "no_such_video.mp4",
            "--max-frames",
            "0",
            "--verbose",
            "false",
        ]);
        assert!(matches!(
            run_tracking(&args).unwrap_err(),
            PipelineError::ConfigError(_)
        ));
    }

    #[test]
    fn test_given_output_dir_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let wanted = dir.path().join("missing");
        let (resolved, created) = resolve_output_dir(Some(&wanted), dir.path()).unwrap();
        assert_eq!(resolved, wanted);
        assert!(!created);
        assert!(!wanted.exists());
    }

    #[test]
    fn test_default_output_dir_created_in_sequence() {
        let runs = tempfile::tempdir().unwrap();
        let (first, created) = resolve_output_dir(None, runs.path()).unwrap();
        assert!(created && first.is_dir());
        assert_eq!(first, runs.path().join("run"));
        let (second, _) = resolve_output_dir(None, runs.path()).unwrap();
        assert_eq!(second, runs.path().join("run2"));
    }

    #[test]
    fn test_failed_run_removes_empty_default_dir() {
        let runs = tempfile::tempdir().unwrap();
        let result: Result<()> = with_output_dir(None, runs.path(), |dir| {
            assert!(dir.is_dir());
            Err(PipelineError::ReadError("undecodable input".to_string()))
        });

        assert!(matches!(result, Err(PipelineError::ReadError(_))));
        assert_eq!(std::fs::read_dir(runs.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_run_keeps_written_files() {
        let runs = tempfile::tempdir().unwrap();
        let result: Result<()> = with_output_dir(None, runs.path(), |dir| {
            std::fs::write(dir.join("partial_tracked.mp4"), b"").unwrap();
            Err(PipelineError::VideoError("encoder failed".to_string()))
        });

        assert!(result.is_err());
        assert!(runs.path().join("run").join("partial_tracked.mp4").is_file());
    }

    #[test]
    fn test_given_dir_kept_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let given = dir.path().join("out");
        std::fs::create_dir(&given).unwrap();
        let result: Result<()> = with_output_dir(Some(&given), dir.path(), |_| {
            Err(PipelineError::ReadError("bad".to_string()))
        });
        assert!(result.is_err());
        assert!(given.is_dir());
    }
}
