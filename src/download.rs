// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Weights and asset downloads.
//!
//! Files are streamed into a `<name>.part` file next to the destination and
//! renamed into place once complete, so an interrupted download never leaves
//! a truncated file under the final name.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{PipelineError, Result};

/// Default location of the BODY_25 weights.
pub const DEFAULT_WEIGHTS: &str = "weights/openpose_body25.onnx";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

/// Progress bar width in characters.
const BAR_WIDTH: usize = 12;

/// Minimum seconds between progress redraws.
const MIN_UPDATE_INTERVAL: f64 = 0.1;

/// Return `path` if it exists, otherwise download it from `url`.
///
/// Missing parent directories are created before downloading.
///
/// # Errors
///
/// Returns [`PipelineError::ModelLoadError`] if the file is missing and no URL
/// was given, or if the download fails.
pub fn ensure_weights<P: AsRef<Path>>(path: P, url: Option<&str>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let Some(url) = url else {
        return Err(PipelineError::ModelLoadError(format!(
            "Weights not found: {}. Pass --weights-url to download them",
            path.display()
        )));
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            PipelineError::ModelLoadError(format!(
                "Failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    download_file(url, path)?;
    Ok(path.to_path_buf())
}

/// Path of the temporary file used while downloading `dest`.
fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(|| "download".to_string(), |n| n.to_string_lossy().to_string());
    dest.with_file_name(format!("{name}.part"))
}

/// Format bytes as human-readable string (e.g., "10.4MB").
#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format elapsed seconds as `5.5s`, `1:05.0` or `1:01:05.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let mins = (seconds / 60.0) as u32;
        format!("{mins}:{:04.1}", seconds % 60.0)
    } else {
        let hours = (seconds / 3600.0) as u32;
        let mins = ((seconds % 3600.0) / 60.0) as u32;
        format!("{hours}:{mins:02}:{:04.1}", seconds % 60.0)
    }
}

/// Progress bar for a fraction in `[0, 1]`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_bar(progress: f64, width: usize) -> String {
    let exact = progress.clamp(0.0, 1.0) * width as f64;
    let filled = exact as usize;

    let mut bar = "━".repeat(filled);
    if filled < width {
        if exact - filled as f64 > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

/// Single-line download progress on stderr.
struct Progress {
    desc: String,
    total: Option<u64>,
    done: u64,
    start: Instant,
    last_draw: Instant,
}

impl Progress {
    fn new(desc: String, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            desc,
            total,
            done: 0,
            start: now,
            last_draw: now,
        }
    }

    fn advance(&mut self, bytes: usize) {
        self.done += bytes as u64;
        if self.last_draw.elapsed().as_secs_f64() >= MIN_UPDATE_INTERVAL {
            self.last_draw = Instant::now();
            eprint!("\r\x1b[K{}", self.line());
            std::io::stderr().flush().ok();
        }
    }

    fn finish(&self) {
        eprintln!("\r\x1b[K{}", self.line());
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn line(&self) -> String {
        let elapsed = self.start.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            (self.done as f64 / elapsed) as u64
        } else {
            0
        };

        match self.total.filter(|&t| t > 0) {
            Some(total) => {
                let progress = (self.done as f64 / total as f64).min(1.0);
                format!(
                    "{}: {}% {} {}/{} {}/s {}",
                    self.desc,
                    (progress * 100.0) as u8,
                    generate_bar(progress, BAR_WIDTH),
                    format_bytes(self.done),
                    format_bytes(total),
                    format_bytes(rate),
                    format_time(elapsed)
                )
            }
            None => format!(
                "{}: {} {}/s {}",
                self.desc,
                format_bytes(self.done),
                format_bytes(rate),
                format_time(elapsed)
            ),
        }
    }
}

/// Stream `url` into `dest` through a `.part` file with a progress line.
///
/// # Errors
///
/// Returns [`PipelineError::ModelLoadError`] on network or file errors.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        PipelineError::ModelLoadError(match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        })
    })?;

    let total: Option<u64> = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());

    let temp_path = part_path(dest);
    let _ = fs::remove_file(&temp_path);

    let mut progress = Progress::new(format!("Downloading {url} to '{}'", dest.display()), total);
    let mut reader = response.into_body().into_reader();

    let streamed = (|| -> Result<()> {
        let file = File::create(&temp_path).map_err(|e| {
            PipelineError::ModelLoadError(format!(
                "Failed to create temp file {}: {e}",
                temp_path.display()
            ))
        })?;
        let mut writer = BufWriter::new(file);
        let mut buffer = [0u8; 65536];

        loop {
            let n = reader.read(&mut buffer).map_err(|e| {
                PipelineError::ModelLoadError(format!("Failed to read from network: {e}"))
            })?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).map_err(|e| {
                PipelineError::ModelLoadError(format!("Failed to write to temp file: {e}"))
            })?;
            progress.advance(n);
        }

        writer
            .flush()
            .map_err(|e| PipelineError::ModelLoadError(format!("Failed to flush temp file: {e}")))
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    progress.finish();

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        PipelineError::ModelLoadError(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_weights_returned_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        fs::write(&path, b"onnx").unwrap();
        assert_eq!(ensure_weights(&path, None).unwrap(), path);
    }

    #[test]
    fn test_missing_weights_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_weights(dir.path().join("missing.onnx"), None).unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoadError(_)));
        assert!(err.to_string().contains("--weights-url"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("weights/body25.onnx")),
            Path::new("weights/body25.onnx.part")
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500B");
        assert_eq!(format_bytes(1024), "1.0KB");
        assert_eq!(format_bytes(1_048_576), "1.0MB");
        assert_eq!(format_bytes(1_073_741_824), "1.0GB");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(5.5), "5.5s");
        assert_eq!(format_time(65.0), "1:05.0");
        assert_eq!(format_time(3665.0), "1:01:05.0");
    }

    #[test]
    fn test_generate_bar() {
        assert_eq!(generate_bar(0.0, 10), "──────────");
        assert_eq!(generate_bar(1.0, 10), "━━━━━━━━━━");
        assert_eq!(generate_bar(0.5, 10), "━━━━━─────");
        assert_eq!(generate_bar(0.46, 10), "━━━━╸─────");
    }
}
