// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Track overlays: boxes, id labels, keypoints and limbs.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::config::DrawOptions;
use crate::detection::Keypoint;
use crate::tracker::TrackSnapshot;
use crate::visualizer::Color;
use crate::visualizer::skeleton::{KPT_COLOR_INDICES, LIMB_COLOR_INDICES, LIMBS};

/// Assets URL for downloading fonts
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Label font.
const FONT: &str = "Arial.ttf";

/// Box outline thickness in pixels.
const BOX_THICKNESS: i32 = 2;

/// Label text height in pixels.
const LABEL_SCALE: f32 = 16.0;

/// Font bytes, loaded at most once per process.
static FONT_DATA: OnceLock<Option<Vec<u8>>> = OnceLock::new();

/// Check if font exists in the user config dir, downloading it otherwise.
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy().to_string();
    let config_dir = dirs::config_dir()?.join(crate::NAME);
    let font_path = config_dir.join(&font_name);

    if font_path.is_file() {
        return Some(font_path);
    }

    if let Err(e) = std::fs::create_dir_all(&config_dir) {
        crate::warn!("Failed to create config directory {}: {e}", config_dir.display());
        return None;
    }

    let url = format!("{ASSETS_URL}/{font_name}");
    match crate::download::download_file(&url, &font_path) {
        Ok(()) => Some(font_path),
        Err(e) => {
            crate::warn!("Track ids will not be drawn: {e}");
            None
        }
    }
}

fn label_font() -> Option<FontRef<'static>> {
    let data = FONT_DATA.get_or_init(|| check_font(FONT).and_then(|p| std::fs::read(p).ok()));
    data.as_deref().and_then(|d| FontRef::try_from_slice(d).ok())
}

/// Box corners rounded and clamped to the image, or `None` when empty.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn clamp_box(track: &TrackSnapshot, width: u32, height: u32) -> Option<(i32, i32, i32, i32)> {
    let b = &track.bbox;
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let x1 = (b.x1.min(b.x2).round() as i32).clamp(0, max_x);
    let y1 = (b.y1.min(b.y2).round() as i32).clamp(0, max_y);
    let x2 = (b.x1.max(b.x2).round() as i32).clamp(0, max_x);
    let y2 = (b.y1.max(b.y2).round() as i32).clamp(0, max_y);
    (x2 > x1 && y2 > y1).then_some((x1, y1, x2, y2))
}

#[allow(clippy::cast_sign_loss)]
fn draw_box(img: &mut RgbImage, (x1, y1, x2, y2): (i32, i32, i32, i32), color: Color) {
    for t in 0..BOX_THICKNESS {
        let (tx1, ty1) = (x1 + t, y1 + t);
        let (tx2, ty2) = (x2 - t, y2 - t);
        if tx2 > tx1 && ty2 > ty1 {
            let rect = Rect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
            draw_hollow_rect_mut(img, rect, color.into());
        }
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn draw_id_label(img: &mut RgbImage, font: &FontRef<'_>, corner: (i32, i32), bottom: i32, id: u64, color: Color) {
    let label = format!("id:{id}");
    let scale = PxScale::from(LABEL_SCALE);
    let (text_w, text_h) = text_size(scale, font, &label);
    let (pad_w, pad_h) = (text_w as i32 + 6, text_h as i32 + 6);

    let (x, y) = corner;
    // above the box when there is room, otherwise just inside it
    let top = if y >= pad_h { y - pad_h } else { (y + BOX_THICKNESS).min(bottom) };
    let left = x.min(img.width() as i32 - pad_w).max(0);

    draw_filled_rect_mut(img, Rect::at(left, top).of_size(pad_w as u32, pad_h as u32), color.into());
    draw_text_mut(img, color.contrast().into(), left + 3, top + 3, scale, font, &label);
}

#[allow(clippy::cast_precision_loss)]
fn visible(kp: Option<Keypoint>, width: u32, height: u32) -> Option<(f32, f32)> {
    kp.filter(|k| k.x >= 0.0 && k.y >= 0.0 && k.x < width as f32 && k.y < height as f32)
        .map(|k| (k.x, k.y))
}

#[allow(clippy::cast_possible_truncation)]
fn draw_skeleton(img: &mut RgbImage, keypoints: &[Option<Keypoint>], options: &DrawOptions, radius: i32) {
    let (width, height) = img.dimensions();
    let at = |j: usize| visible(keypoints.get(j).copied().flatten(), width, height);

    if options.limbs {
        for (limb, &[a, b]) in LIMBS.iter().enumerate() {
            let (Some(start), Some(end)) = (at(a), at(b)) else {
                continue;
            };
            let color = Color::from_pose_index(LIMB_COLOR_INDICES[limb]).into();
            for offset in [-0.5f32, 0.0, 0.5] {
                draw_line_segment_mut(img, (start.0 + offset, start.1), (end.0 + offset, end.1), color);
                draw_line_segment_mut(img, (start.0, start.1 + offset), (end.0, end.1 + offset), color);
            }
        }
    }

    if options.keypoints {
        for (joint, &color_idx) in KPT_COLOR_INDICES.iter().enumerate() {
            if let Some((x, y)) = at(joint) {
                let color = Color::from_pose_index(color_idx).into();
                draw_filled_circle_mut(img, (x.round() as i32, y.round() as i32), radius, color);
            }
        }
    }
}

/// Draw tracks onto a copy of `frame`.
///
/// Id labels are drawn only together with boxes. With keypoints, limbs and
/// boxes off, or on an empty frame, the frame is returned unchanged.
#[must_use]
pub fn draw_tracks(frame: &DynamicImage, tracks: &[TrackSnapshot], options: &DrawOptions) -> DynamicImage {
    let (width, height) = (frame.width(), frame.height());
    if !options.any() || tracks.is_empty() || width == 0 || height == 0 {
        return frame.clone();
    }

    let mut img = frame.to_rgb8();
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let radius = (width.max(height) / 200).max(2) as i32;

    if options.keypoints || options.limbs {
        for track in tracks {
            draw_skeleton(&mut img, &track.keypoints, options, radius);
        }
    }

    let font = if options.bbox && options.ids { label_font() } else { None };
    for track in tracks {
        let Some(corners) = clamp_box(track, width, height) else {
            continue;
        };
        let color = Color::from_track_id(track.id);
        if options.bbox {
            draw_box(&mut img, corners, color);
        }
        if let Some(font) = &font {
            draw_id_label(&mut img, font, (corners.0, corners.1), corners.3, track.id, color);
        }
    }

    DynamicImage::ImageRgb8(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use image::Rgb;

    fn track(id: u64, keypoints: Vec<Option<Keypoint>>) -> TrackSnapshot {
        TrackSnapshot {
            id,
            bbox: BoundingBox::new(10.0, 10.0, 50.0, 70.0),
            keypoints,
            score: 1.0,
            age: 0,
            hits: 1,
            time_since_update: 0,
        }
    }

    fn no_ids() -> DrawOptions {
        DrawOptions {
            ids: false,
            ..DrawOptions::default()
        }
    }

    #[test]
    fn test_all_flags_off_is_identity() {
        let mut frame = RgbImage::new(64, 64);
        frame.put_pixel(3, 4, Rgb([9, 8, 7]));
        let frame = DynamicImage::ImageRgb8(frame);

        let out = draw_tracks(&frame, &[track(1, vec![None; 25])], &DrawOptions::none());
        assert_eq!(out, frame);
    }

    #[test]
    fn test_ids_without_boxes_is_identity() {
        let mut frame = RgbImage::new(64, 64);
        frame.put_pixel(20, 20, Rgb([1, 2, 3]));
        let frame = DynamicImage::ImageRgb8(frame);

        let options = DrawOptions {
            keypoints: false,
            limbs: false,
            bbox: false,
            ..DrawOptions::default()
        };
        assert!(options.ids);
        let out = draw_tracks(&frame, &[track(1, vec![None; 25]), track(2, vec![None; 25])], &options);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_empty_frame_returned_as_is() {
        let frame = DynamicImage::new_rgb8(0, 0);
        let out = draw_tracks(&frame, &[track(1, vec![None; 25])], &no_ids());
        assert_eq!(out, frame);

        let strip = DynamicImage::new_rgb8(40, 0);
        assert_eq!(draw_tracks(&strip, &[track(1, vec![None; 25])], &no_ids()), strip);
    }

    #[test]
    fn test_box_uses_track_color() {
        let frame = DynamicImage::new_rgb8(80, 80);
        let options = DrawOptions {
            keypoints: false,
            limbs: false,
            ..no_ids()
        };
        let out = draw_tracks(&frame, &[track(3, vec![None; 25])], &options).to_rgb8();

        let expected: Rgb<u8> = Color::from_track_id(3).into();
        assert_eq!(*out.get_pixel(10, 40), expected);
        assert_eq!(*out.get_pixel(11, 40), expected);
        assert_eq!(*out.get_pixel(30, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_keypoints_and_limbs() {
        let mut kps = vec![None; 25];
        kps[1] = Some(Keypoint::new(30.0, 20.0, 0.9));
        kps[8] = Some(Keypoint::new(30.0, 60.0, 0.9));
        kps[4] = Some(Keypoint::new(70.0, 70.0, 0.9));

        let frame = DynamicImage::new_rgb8(80, 80);
        let options = DrawOptions {
            bbox: false,
            ..no_ids()
        };
        let out = draw_tracks(&frame, &[track(1, kps)], &options).to_rgb8();

        let neck: Rgb<u8> = Color::from_pose_index(KPT_COLOR_INDICES[1]).into();
        assert_eq!(*out.get_pixel(30, 20), neck);

        // neck to mid-hip is limb 0 and both ends are present
        let torso: Rgb<u8> = Color::from_pose_index(LIMB_COLOR_INDICES[0]).into();
        assert_eq!(*out.get_pixel(30, 40), torso);

        // right wrist has no partner, so nothing is drawn between it and the elbow slot
        assert_eq!(*out.get_pixel(60, 60), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_out_of_frame_box_skipped() {
        let frame = DynamicImage::new_rgb8(32, 32);
        let mut t = track(1, vec![None; 25]);
        t.bbox = BoundingBox::new(100.0, 100.0, 200.0, 200.0);
        let out = draw_tracks(&frame, &[t], &no_ids());
        assert_eq!(out, frame);
    }
}
