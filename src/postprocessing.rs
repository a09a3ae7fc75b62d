// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing for OpenPose BODY_25 outputs.
//!
//! The network produces 26 heatmaps (25 joints plus background) and 52 part
//! affinity field channels at input resolution. Decoding runs in four steps:
//!
//! 1. [`find_peaks`] extracts joint candidates as local maxima of each heatmap.
//! 2. [`find_connections`] scores candidate limbs by integrating the PAF along
//!    the segment between two candidates and greedily keeps the best ones.
//! 3. [`assemble_people`] groups limbs that share joints into people.
//! 4. [`decode`] maps everything back to frame coordinates as [`Detection`]s.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use ndarray::{Array3, Axis};

use crate::config::PoseConfig;
use crate::detection::{BoundingBox, Detection, Keypoint};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{ResizeTransform, resize_plane};
use crate::visualizer::skeleton::{
    HEATMAP_CHANNELS, LIMBS, NUM_JOINTS, NUM_LIMBS, PAF_CHANNELS, PAF_INDICES,
};

/// Number of points sampled along a candidate limb.
const LIMB_SAMPLES: usize = 10;

/// Fraction of samples that must be aligned with the field.
const MIN_ALIGNED_RATIO: f32 = 0.8;

/// Minimum average score per joint for a person to be kept.
const MIN_AVG_SCORE: f32 = 0.4;

/// Network outputs in `(H, W, C)` layout at input resolution.
#[derive(Debug, Clone)]
pub struct PoseMaps {
    /// Joint heatmaps, `(R, R, 26)`.
    pub heatmaps: Array3<f32>,
    /// Part affinity fields, `(R, R, 52)`.
    pub pafs: Array3<f32>,
}

impl PoseMaps {
    /// Build maps from raw model outputs `(data, shape)`.
    ///
    /// Outputs are told apart by channel count and may be channel-last or
    /// channel-first, with or without a batch dimension. Maps whose spatial
    /// size differs from `input_res` are resized to it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InferenceError`] when either output is missing or malformed.
    pub fn from_outputs(outputs: &[(Vec<f32>, Vec<usize>)], input_res: u32) -> Result<Self> {
        let find = |channels: usize, label: &str| -> Result<Array3<f32>> {
            outputs
                .iter()
                .find_map(|(data, shape)| to_hwc(data, shape, channels))
                .ok_or_else(|| {
                    let shapes: Vec<_> = outputs.iter().map(|(_, s)| s.clone()).collect();
                    PipelineError::InferenceError(format!(
                        "no {label} output with {channels} channels among {shapes:?}"
                    ))
                })
                .and_then(|map| resize_map(map, input_res))
        };

        Ok(Self {
            heatmaps: find(HEATMAP_CHANNELS, "heatmap")?,
            pafs: find(PAF_CHANNELS, "part affinity field")?,
        })
    }

    /// Element-wise mean of maps computed at several input scales.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InferenceError`] when `maps` is empty or the
    /// shapes disagree.
    pub fn average(maps: Vec<Self>) -> Result<Self> {
        let mut maps = maps.into_iter();
        let Some(first) = maps.next() else {
            return Err(PipelineError::InferenceError("no maps to average".to_string()));
        };

        let Self { mut heatmaps, mut pafs } = first;
        let mut count = 1.0f32;
        for other in maps {
            if other.heatmaps.dim() != heatmaps.dim() || other.pafs.dim() != pafs.dim() {
                return Err(PipelineError::InferenceError(format!(
                    "cannot average maps of shapes {:?} and {:?}",
                    heatmaps.dim(),
                    other.heatmaps.dim()
                )));
            }
            heatmaps += &other.heatmaps;
            pafs += &other.pafs;
            count += 1.0;
        }

        heatmaps /= count;
        pafs /= count;
        Ok(Self { heatmaps, pafs })
    }
}

/// Interpret a raw output as `(H, W, channels)`, accepting NHWC, NCHW, HWC and CHW.
fn to_hwc(data: &[f32], shape: &[usize], channels: usize) -> Option<Array3<f32>> {
    let dims: Vec<usize> = match shape.len() {
        4 if shape[0] == 1 => shape[1..].to_vec(),
        3 => shape.to_vec(),
        _ => return None,
    };
    if data.len() != dims.iter().product::<usize>() {
        return None;
    }

    if dims[2] == channels {
        Array3::from_shape_vec((dims[0], dims[1], dims[2]), data.to_vec()).ok()
    } else if dims[0] == channels {
        let chw = Array3::from_shape_vec((dims[0], dims[1], dims[2]), data.to_vec()).ok()?;
        Some(chw.permuted_axes([1, 2, 0]).as_standard_layout().into_owned())
    } else {
        None
    }
}

/// Resize every channel of an `(H, W, C)` map to `res x res`.
fn resize_map(map: Array3<f32>, res: u32) -> Result<Array3<f32>> {
    let (h, w, c) = map.dim();
    if h == res as usize && w == res as usize {
        return Ok(map);
    }

    let r = res as usize;
    let mut out = Array3::zeros((r, r, c));
    for ch in 0..c {
        let plane: Vec<f32> = map.index_axis(Axis(2), ch).iter().copied().collect();
        let resized = resize_plane(&plane, w as u32, h as u32, res, res)?;
        for (i, v) in resized.into_iter().enumerate() {
            out[[i / r, i % r, ch]] = v;
        }
    }
    Ok(out)
}

/// Smooth every heatmap channel with a Gaussian of the given sigma.
///
/// The kernel spans `3 * sigma` on each side and is applied separably with zero padding.
pub fn gaussian_smooth(heatmaps: &mut Array3<f32>, sigma: f32) {
    if sigma <= 0.0 {
        return;
    }
    let radius = (3.0 * sigma).floor() as isize;
    let norm = 1.0 / (sigma * (2.0 * std::f32::consts::PI).sqrt());
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|d| norm * (-((d * d) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();

    let (h, w, c) = heatmaps.dim();
    let mut tmp = Array3::<f32>::zeros((h, w, c));

    // Horizontal pass
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = x as isize + k as isize - radius;
                    if sx >= 0 && (sx as usize) < w {
                        acc += weight * heatmaps[[y, sx as usize, ch]];
                    }
                }
                tmp[[y, x, ch]] = acc;
            }
        }
    }

    // Vertical pass
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = y as isize + k as isize - radius;
                    if sy >= 0 && (sy as usize) < h {
                        acc += weight * tmp[[sy as usize, x, ch]];
                    }
                }
                heatmaps[[y, x, ch]] = acc;
            }
        }
    }
}

/// A joint candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Column in the heatmap.
    pub x: usize,
    /// Row in the heatmap.
    pub y: usize,
    /// Heatmap value.
    pub score: f32,
    /// Global candidate id, unique across joints.
    pub id: usize,
}

/// Extract joint candidates from the heatmaps.
///
/// A pixel is a candidate of joint `j` when its value is positive, at least
/// `threshold`, and not smaller than any of its four neighbours (values
/// outside the map count as zero). Ids are assigned joint by joint in
/// row-major order.
#[must_use]
pub fn find_peaks(heatmaps: &Array3<f32>, threshold: f32) -> Vec<Vec<Peak>> {
    let (h, w, c) = heatmaps.dim();
    let mut next_id = 0;

    (0..NUM_JOINTS.min(c))
        .map(|j| {
            let at = |y: isize, x: isize| -> f32 {
                if y < 0 || x < 0 || y as usize >= h || x as usize >= w {
                    0.0
                } else {
                    heatmaps[[y as usize, x as usize, j]]
                }
            };

            let mut peaks = Vec::new();
            for y in 0..h {
                for x in 0..w {
                    let v = heatmaps[[y, x, j]];
                    if v <= 0.0 || v < threshold {
                        continue;
                    }
                    let (yi, xi) = (y as isize, x as isize);
                    if v >= at(yi - 1, xi)
                        && v >= at(yi + 1, xi)
                        && v >= at(yi, xi - 1)
                        && v >= at(yi, xi + 1)
                    {
                        peaks.push(Peak {
                            x,
                            y,
                            score: v,
                            id: next_id,
                        });
                        next_id += 1;
                    }
                }
            }
            peaks
        })
        .collect()
}

/// An accepted limb between two joint candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    /// Global id of the candidate at the limb's first joint.
    pub a: usize,
    /// Global id of the candidate at the limb's second joint.
    pub b: usize,
    /// PAF score with distance prior.
    pub score: f32,
}

/// Evenly spaced sample coordinates from `start` to `end`, rounded half to even.
fn sample_line(start: usize, end: usize) -> impl Iterator<Item = usize> {
    let (s, e) = (start as f32, end as f32);
    (0..LIMB_SAMPLES).map(move |i| {
        let t = i as f32 / (LIMB_SAMPLES - 1) as f32;
        (s + (e - s) * t).round_ties_even().max(0.0) as usize
    })
}

/// Score and select limbs for every BODY_25 limb type.
///
/// Returns one list per entry of [`LIMBS`]; a list is empty when either joint
/// has no candidates.
#[must_use]
pub fn find_connections(
    pafs: &Array3<f32>,
    peaks: &[Vec<Peak>],
    input_res: u32,
    threshold: f32,
) -> Vec<Vec<Connection>> {
    let (h, w, _) = pafs.dim();
    let res = input_res as f32;

    LIMBS
        .iter()
        .zip(PAF_INDICES.iter())
        .map(|(&[ja, jb], &[px, py])| {
            let (cand_a, cand_b) = (&peaks[ja], &peaks[jb]);
            if cand_a.is_empty() || cand_b.is_empty() {
                return Vec::new();
            }

            // (index in a, index in b, score)
            let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
            for (i, pa) in cand_a.iter().enumerate() {
                for (j, pb) in cand_b.iter().enumerate() {
                    let dx = pb.x as f32 - pa.x as f32;
                    let dy = pb.y as f32 - pa.y as f32;
                    let norm = dx.hypot(dy);
                    if norm == 0.0 {
                        continue;
                    }
                    let (ux, uy) = (dx / norm, dy / norm);

                    let projections: Vec<f32> = sample_line(pa.x, pb.x)
                        .zip(sample_line(pa.y, pb.y))
                        .map(|(x, y)| {
                            let (x, y) = (x.min(w - 1), y.min(h - 1));
                            pafs[[y, x, px]] * ux + pafs[[y, x, py]] * uy
                        })
                        .collect();

                    let mean = projections.iter().sum::<f32>() / projections.len() as f32;
                    let score = mean + (0.5 * res / norm - 1.0).min(0.0);
                    let aligned = projections.iter().filter(|&&p| p > threshold).count();

                    if aligned as f32 > MIN_ALIGNED_RATIO * projections.len() as f32 && score > 0.0 {
                        candidates.push((i, j, score));
                    }
                }
            }

            candidates.sort_by(|l, r| r.2.total_cmp(&l.2));

            let limit = cand_a.len().min(cand_b.len());
            let mut used_a = vec![false; cand_a.len()];
            let mut used_b = vec![false; cand_b.len()];
            let mut accepted = Vec::new();
            for (i, j, score) in candidates {
                if used_a[i] || used_b[j] {
                    continue;
                }
                used_a[i] = true;
                used_b[j] = true;
                accepted.push(Connection {
                    a: cand_a[i].id,
                    b: cand_b[j].id,
                    score,
                });
                if accepted.len() >= limit {
                    break;
                }
            }
            accepted
        })
        .collect()
}

/// A person under assembly: candidate id per joint, accumulated score and joint count.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    /// Global candidate id for each joint.
    pub joints: [Option<usize>; NUM_JOINTS],
    /// Sum of candidate and connection scores.
    pub score: f32,
    /// Number of assigned joints.
    pub count: usize,
}

impl Person {
    fn overlaps(&self, other: &Self) -> bool {
        self.joints
            .iter()
            .zip(other.joints.iter())
            .any(|(a, b)| a.is_some() && b.is_some())
    }
}

/// Group limbs into people.
///
/// Limbs are visited in BODY_25 order. A limb whose endpoint already belongs
/// to one person extends that person; a limb linking two people with no
/// joint in common merges them; otherwise it starts a new person. People
/// with fewer than `min_parts` joints or an average score below 0.4 are
/// dropped.
#[must_use]
pub fn assemble_people(
    peaks: &[Vec<Peak>],
    connections: &[Vec<Connection>],
    min_parts: usize,
) -> Vec<Person> {
    let scores: Vec<f32> = {
        let mut flat: Vec<&Peak> = peaks.iter().flatten().collect();
        flat.sort_by_key(|p| p.id);
        flat.iter().map(|p| p.score).collect()
    };
    let peak_score = |id: usize| scores.get(id).copied().unwrap_or(0.0);

    let mut people: Vec<Person> = Vec::new();

    for (limb, limb_connections) in connections.iter().enumerate().take(NUM_LIMBS) {
        let [ja, jb] = LIMBS[limb];
        for conn in limb_connections {
            let owners: Vec<usize> = people
                .iter()
                .enumerate()
                .filter(|(_, p)| p.joints[ja] == Some(conn.a) || p.joints[jb] == Some(conn.b))
                .map(|(i, _)| i)
                .take(2)
                .collect();

            match owners.as_slice() {
                [j] => {
                    let person = &mut people[*j];
                    if person.joints[jb] != Some(conn.b) {
                        person.joints[jb] = Some(conn.b);
                        person.count += 1;
                        person.score += peak_score(conn.b) + conn.score;
                    }
                }
                [j1, j2] => {
                    let (j1, j2) = (*j1, *j2);
                    if people[j1].overlaps(&people[j2]) {
                        let person = &mut people[j1];
                        person.joints[jb] = Some(conn.b);
                        person.count += 1;
                        person.score += peak_score(conn.b) + conn.score;
                    } else {
                        let other = people.remove(j2);
                        let person = &mut people[j1];
                        for (slot, joint) in person.joints.iter_mut().zip(other.joints) {
                            if joint.is_some() {
                                *slot = joint;
                            }
                        }
                        person.count += other.count;
                        person.score += other.score + conn.score;
                    }
                }
                _ => {
                    let mut joints = [None; NUM_JOINTS];
                    joints[ja] = Some(conn.a);
                    joints[jb] = Some(conn.b);
                    people.push(Person {
                        joints,
                        score: peak_score(conn.a) + peak_score(conn.b) + conn.score,
                        count: 2,
                    });
                }
            }
        }
    }

    people.retain(|p| p.count >= min_parts && p.score / p.count as f32 >= MIN_AVG_SCORE);
    people
}

/// Bounding box around keypoints, padded by a tenth of its diagonal and clamped to the frame.
#[must_use]
pub fn keypoint_bbox(keypoints: &[Option<Keypoint>], width: u32, height: u32) -> Option<BoundingBox> {
    let tight = BoundingBox::from_keypoints(keypoints)?;
    let pad = (tight.width().hypot(tight.height()) / 10.0).floor();
    let padded = tight.padded(pad, width as f32, height as f32);
    Some(BoundingBox::new(
        padded.x1.floor(),
        padded.y1.floor(),
        padded.x2.floor(),
        padded.y2.floor(),
    ))
}

/// Decode network outputs into detections in original frame coordinates.
#[must_use]
pub fn decode(mut maps: PoseMaps, transform: &ResizeTransform, config: &PoseConfig) -> Vec<Detection> {
    if let Some(sigma) = config.gaussian_sigma {
        gaussian_smooth(&mut maps.heatmaps, sigma);
    }

    let peaks = find_peaks(&maps.heatmaps, config.joint_threshold);
    let connections = find_connections(
        &maps.pafs,
        &peaks,
        config.input_res,
        config.connection_threshold,
    );
    let people = assemble_people(&peaks, &connections, config.min_parts);

    let by_id: Vec<&Peak> = {
        let mut flat: Vec<&Peak> = peaks.iter().flatten().collect();
        flat.sort_by_key(|p| p.id);
        flat
    };

    people
        .into_iter()
        .map(|person| {
            let keypoints: Vec<Option<Keypoint>> = person
                .joints
                .iter()
                .map(|slot| {
                    slot.and_then(|id| by_id.get(id)).map(|peak| {
                        let (x, y) = transform.to_original(peak.x as f32, peak.y as f32);
                        Keypoint::new(x, y, peak.score)
                    })
                })
                .collect();
            let bbox = keypoint_bbox(&keypoints, transform.orig_width, transform.orig_height);
            Detection {
                keypoints,
                bbox,
                score: person.score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::ResizeMode;

    const RES: usize = 64;

    /// Heatmaps and PAFs for one upright torso: neck, mid hip and both shoulders.
    fn torso_maps() -> PoseMaps {
        let mut heatmaps = Array3::zeros((RES, RES, HEATMAP_CHANNELS));
        let mut pafs = Array3::zeros((RES, RES, PAF_CHANNELS));

        heatmaps[[10, 32, 1]] = 0.9; // neck
        heatmaps[[40, 32, 8]] = 0.9; // mid hip
        heatmaps[[10, 22, 2]] = 0.9; // right shoulder
        heatmaps[[10, 42, 5]] = 0.9; // left shoulder

        for y in 10..=40 {
            pafs[[y, 32, 1]] = 1.0; // neck -> mid hip points down
        }
        for x in 22..=32 {
            pafs[[10, x, 14]] = -1.0; // neck -> right shoulder points left
        }
        for x in 32..=42 {
            pafs[[10, x, 22]] = 1.0; // neck -> left shoulder points right
        }

        PoseMaps { heatmaps, pafs }
    }

    fn stretch(orig: u32) -> ResizeTransform {
        ResizeTransform {
            orig_width: orig,
            orig_height: orig,
            input_res: RES as u32,
            mode: ResizeMode::Stretch,
        }
    }

    #[test]
    fn test_average_is_elementwise_mean() {
        let mut low = torso_maps();
        let mut high = torso_maps();
        low.heatmaps[[10, 32, 1]] = 0.4;
        high.heatmaps[[10, 32, 1]] = 0.8;
        low.pafs[[20, 32, 1]] = 0.0;
        high.pafs[[20, 32, 1]] = 1.0;
        high.heatmaps[[5, 5, 0]] = 0.6;

        let mean = PoseMaps::average(vec![low, high]).unwrap();
        assert!((mean.heatmaps[[10, 32, 1]] - 0.6).abs() < 1e-6);
        assert!((mean.pafs[[20, 32, 1]] - 0.5).abs() < 1e-6);
        assert!((mean.heatmaps[[5, 5, 0]] - 0.3).abs() < 1e-6);
        assert!(mean.heatmaps[[40, 40, 3]].abs() < f32::EPSILON);
    }

    #[test]
    fn test_average_single_and_invalid() {
        let single = PoseMaps::average(vec![torso_maps()]).unwrap();
        assert_eq!(single.heatmaps, torso_maps().heatmaps);

        assert!(PoseMaps::average(Vec::new()).is_err());

        let small = PoseMaps {
            heatmaps: Array3::zeros((8, 8, HEATMAP_CHANNELS)),
            pafs: Array3::zeros((8, 8, PAF_CHANNELS)),
        };
        assert!(matches!(
            PoseMaps::average(vec![torso_maps(), small]).unwrap_err(),
            PipelineError::InferenceError(_)
        ));
    }

    #[test]
    fn test_find_peaks_local_maxima() {
        let mut hm = Array3::zeros((8, 8, HEATMAP_CHANNELS));
        hm[[2, 2, 0]] = 0.5;
        hm[[2, 3, 0]] = 0.3; // neighbour of a larger value
        hm[[6, 6, 0]] = 0.05; // below threshold
        hm[[0, 0, 3]] = 0.7; // corner, outside counts as zero
        hm[[4, 4, 25]] = 0.9; // background channel is ignored

        let peaks = find_peaks(&hm, 0.1);
        assert_eq!(peaks.len(), NUM_JOINTS);
        assert_eq!(peaks[0].len(), 1);
        assert_eq!((peaks[0][0].x, peaks[0][0].y, peaks[0][0].id), (2, 2, 0));
        assert_eq!(peaks[3].len(), 1);
        assert_eq!(peaks[3][0].id, 1);
        assert_eq!(peaks.iter().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn test_find_peaks_plateau_keeps_ties() {
        let mut hm = Array3::zeros((4, 4, HEATMAP_CHANNELS));
        hm[[1, 1, 0]] = 0.5;
        hm[[1, 2, 0]] = 0.5;
        let peaks = find_peaks(&hm, 0.1);
        assert_eq!(peaks[0].len(), 2);
        assert!(peaks[0][0].x < peaks[0][1].x);
    }

    #[test]
    fn test_connections_respect_field_direction() {
        let maps = torso_maps();
        let peaks = find_peaks(&maps.heatmaps, 0.1);
        let connections = find_connections(&maps.pafs, &peaks, RES as u32, 0.05);

        assert_eq!(connections.len(), NUM_LIMBS);
        assert_eq!(connections[0].len(), 1); // neck -> mid hip
        assert!((connections[0][0].score - 1.0).abs() < 1e-5);
        assert_eq!(connections[1].len(), 1); // neck -> right shoulder
        assert_eq!(connections[2].len(), 1); // neck -> left shoulder
        assert!(connections[3..].iter().all(Vec::is_empty));
    }

    #[test]
    fn test_connections_reject_misaligned_field() {
        let mut maps = torso_maps();
        for y in 10..=40 {
            maps.pafs[[y, 32, 1]] = -1.0;
        }
        let peaks = find_peaks(&maps.heatmaps, 0.1);
        let connections = find_connections(&maps.pafs, &peaks, RES as u32, 0.05);
        assert!(connections[0].is_empty());
    }

    #[test]
    fn test_connections_distance_prior() {
        let mut maps = torso_maps();
        for y in 10..=40 {
            maps.pafs[[y, 32, 1]] = 0.5;
        }
        let peaks = find_peaks(&maps.heatmaps, 0.1);
        // norm 30: 0.5 * 16 / 30 - 1 < -0.5, which cancels the 0.5 mean
        let connections = find_connections(&maps.pafs, &peaks, 16, 0.05);
        assert!(connections[0].is_empty());
    }

    #[test]
    fn test_connections_no_endpoint_reuse() {
        let mut maps = torso_maps();
        maps.heatmaps[[10, 36, 1]] = 0.8; // second neck candidate
        for y in 10..=40 {
            maps.pafs[[y, 36, 1]] = 1.0;
        }
        let peaks = find_peaks(&maps.heatmaps, 0.1);
        assert_eq!(peaks[1].len(), 2);

        let connections = find_connections(&maps.pafs, &peaks, RES as u32, 0.05);
        // only one mid hip, so only one neck can use it
        assert_eq!(connections[0].len(), 1);
    }

    #[test]
    fn test_assemble_merges_disjoint_people() {
        let peak = |x, id| Peak { x, y: 0, score: 0.5, id };
        let mut peaks = vec![Vec::new(); NUM_JOINTS];
        peaks[1] = vec![peak(0, 0)];
        peaks[2] = vec![peak(1, 1)];
        peaks[15] = vec![peak(2, 2)];
        peaks[17] = vec![peak(3, 3)];

        let mut connections = vec![Vec::new(); NUM_LIMBS];
        connections[1] = vec![Connection { a: 0, b: 1, score: 1.0 }]; // neck - right shoulder
        connections[15] = vec![Connection { a: 2, b: 3, score: 1.0 }]; // right eye - right ear
        connections[18] = vec![Connection { a: 1, b: 3, score: 0.5 }]; // right shoulder - right ear

        let people = assemble_people(&peaks, &connections, 2);
        assert_eq!(people.len(), 1);
        let person = &people[0];
        assert_eq!(person.count, 4);
        assert!((person.score - 4.5).abs() < 1e-5);
        assert_eq!(person.joints[1], Some(0));
        assert_eq!(person.joints[2], Some(1));
        assert_eq!(person.joints[15], Some(2));
        assert_eq!(person.joints[17], Some(3));
    }

    #[test]
    fn test_assemble_filters_small_and_weak_people() {
        let peak = |id| Peak { x: id, y: 0, score: 0.1, id };
        let mut peaks = vec![Vec::new(); NUM_JOINTS];
        peaks[1] = vec![peak(0)];
        peaks[8] = vec![peak(1)];

        let mut connections = vec![Vec::new(); NUM_LIMBS];
        connections[0] = vec![Connection { a: 0, b: 1, score: 0.5 }];

        assert!(assemble_people(&peaks, &connections, 4).is_empty());
        // two joints, average (0.1 + 0.1 + 0.5) / 2 = 0.35 < 0.4
        assert!(assemble_people(&peaks, &connections, 2).is_empty());

        connections[0][0].score = 1.0;
        assert_eq!(assemble_people(&peaks, &connections, 2).len(), 1);
    }

    #[test]
    fn test_decode_single_person() {
        let config = PoseConfig::new().with_input_res(RES as u32);
        let detections = decode(torso_maps(), &stretch(128), &config);
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        assert_eq!(det.keypoints.len(), NUM_JOINTS);
        assert_eq!(det.num_visible(), 4);
        let neck = det.keypoints[1].unwrap();
        assert!((neck.x - 64.0).abs() < 1e-4);
        assert!((neck.y - 20.0).abs() < 1e-4);
        assert!((neck.confidence - 0.9).abs() < 1e-6);
        assert!((det.score - 6.6).abs() < 1e-4);

        // extent 44..84 x 20..80, diagonal 72.1 -> pad 7
        assert_eq!(det.bbox, Some(BoundingBox::new(37.0, 13.0, 91.0, 87.0)));
    }

    #[test]
    fn test_decode_empty_maps() {
        let maps = PoseMaps {
            heatmaps: Array3::zeros((RES, RES, HEATMAP_CHANNELS)),
            pafs: Array3::zeros((RES, RES, PAF_CHANNELS)),
        };
        let config = PoseConfig::new().with_input_res(RES as u32);
        assert!(decode(maps, &stretch(RES as u32), &config).is_empty());
    }

    #[test]
    fn test_keypoint_bbox_clamps_to_frame() {
        let mut kps = vec![None; NUM_JOINTS];
        kps[0] = Some(Keypoint::new(1.0, 1.0, 1.0));
        kps[1] = Some(Keypoint::new(99.0, 99.0, 1.0));
        let bbox = keypoint_bbox(&kps, 100, 100).unwrap();
        assert_eq!(bbox, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_gaussian_smooth_spreads_symmetrically() {
        let mut hm = Array3::zeros((21, 21, 1));
        hm[[10, 10, 0]] = 1.0;
        gaussian_smooth(&mut hm, 1.0);

        assert!(hm[[10, 10, 0]] < 1.0);
        assert!(hm[[10, 10, 0]] > hm[[10, 11, 0]]);
        assert!((hm[[10, 11, 0]] - hm[[10, 9, 0]]).abs() < 1e-6);
        assert!((hm[[9, 10, 0]] - hm[[10, 9, 0]]).abs() < 1e-6);
        assert!(hm[[10, 14, 0]].abs() < f32::EPSILON); // outside radius 3
        let total: f32 = hm.iter().sum();
        assert!((total - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_maps_from_outputs_layouts() {
        let r = 8;
        let hm_nhwc = (vec![0.0; r * r * HEATMAP_CHANNELS], vec![1, r, r, HEATMAP_CHANNELS]);
        let mut paf_nchw = vec![0.0; PAF_CHANNELS * r * r];
        paf_nchw[3 * r * r + 2 * r + 5] = 0.75; // channel 3, y 2, x 5
        let paf_nchw = (paf_nchw, vec![1, PAF_CHANNELS, r, r]);

        let maps = PoseMaps::from_outputs(&[paf_nchw, hm_nhwc], r as u32).unwrap();
        assert_eq!(maps.heatmaps.dim(), (r, r, HEATMAP_CHANNELS));
        assert_eq!(maps.pafs.dim(), (r, r, PAF_CHANNELS));
        assert!((maps.pafs[[2, 5, 3]] - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_maps_from_outputs_resizes_and_rejects() {
        let hm = (vec![0.5; 4 * 4 * HEATMAP_CHANNELS], vec![1, 4, 4, HEATMAP_CHANNELS]);
        let paf = (vec![0.0; 4 * 4 * PAF_CHANNELS], vec![1, 4, 4, PAF_CHANNELS]);
        let maps = PoseMaps::from_outputs(&[hm.clone(), paf], 8).unwrap();
        assert_eq!(maps.heatmaps.dim(), (8, 8, HEATMAP_CHANNELS));
        assert!((maps.heatmaps[[3, 3, 0]] - 0.5).abs() < 1e-3);

        let err = PoseMaps::from_outputs(&[hm], 8).unwrap_err();
        assert!(matches!(err, PipelineError::InferenceError(_)));
    }
}
