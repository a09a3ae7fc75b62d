// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Small geometry and formatting helpers shared across the crate.

use std::path::{Path, PathBuf};

/// Calculate `IoU` (Intersection over Union) between two bounding boxes
///
/// # Arguments
///
/// * `box1` - First bounding box [x1, y1, x2, y2]
/// * `box2` - Second bounding box [x1, y1, x2, y2]
///
/// # Returns
///
/// `IoU` value between 0.0 and 1.0
#[must_use]
pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = ((x2 - x1).max(0.0)) * ((y2 - y1).max(0.0));

    let area1 = (box1[2] - box1[0]).max(0.0) * (box1[3] - box1[1]).max(0.0);
    let area2 = (box2[2] - box2[0]).max(0.0) * (box2[3] - box2[1]).max(0.0);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Format a count with a singular or plural noun, e.g. `"1 person"` or `"3 persons"`.
#[must_use]
pub fn count_label(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {}", pluralize(noun))
    }
}

fn pluralize(noun: &str) -> String {
    if noun.ends_with('s') {
        format!("{noun}es")
    } else {
        format!("{noun}s")
    }
}

/// Find the next available run directory (`run`, `run2`, `run3`, ...) under `base`.
#[must_use]
pub fn find_next_run_dir<P: AsRef<Path>>(base: P, prefix: &str) -> PathBuf {
    let base_path = base.as_ref();

    let first = base_path.join(prefix);
    if !first.exists() {
        return first;
    }

    (2..)
        .map(|i| base_path.join(format!("{prefix}{i}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
