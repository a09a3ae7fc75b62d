// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame preprocessing for the OpenPose network.
//!
//! The network takes a square `R x R` RGB image with raw 0..255 values; the
//! normalization lives inside the graph. Frames are either stretched to the
//! square or resized preserving aspect ratio and padded with a constant. The
//! returned [`ResizeTransform`] maps network coordinates back to the frame.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;

use crate::config::{PoseConfig, TensorLayout};
use crate::error::{PipelineError, Result};

/// How a frame was fitted into the network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeMode {
    /// Both axes stretched independently to `R`.
    Stretch,
    /// Aspect preserved, then padded to a square.
    Pad {
        /// Resized width before padding.
        new_width: u32,
        /// Resized height before padding.
        new_height: u32,
        /// Padding above the image.
        pad_top: u32,
        /// Padding left of the image.
        pad_left: u32,
    },
}

/// Mapping between original frame coordinates and network input coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeTransform {
    /// Original frame width.
    pub orig_width: u32,
    /// Original frame height.
    pub orig_height: u32,
    /// Network input resolution.
    pub input_res: u32,
    /// Resize mode used.
    pub mode: ResizeMode,
}

impl ResizeTransform {
    /// Map a point from network input space back to the original frame.
    #[must_use]
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let res = self.input_res as f32;
        let (w, h) = (self.orig_width as f32, self.orig_height as f32);
        match self.mode {
            ResizeMode::Stretch => (x * w / res, y * h / res),
            ResizeMode::Pad { .. } => {
                let scale = w.max(h) / res;
                if h > w {
                    let border = (res - w / scale) / 2.0;
                    (scale * (x - border), scale * y)
                } else {
                    let border = (res - h / scale) / 2.0;
                    (scale * x, scale * (y - border))
                }
            }
        }
    }
}

/// Result of preprocessing a frame.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Network input tensor, `[1, R, R, 3]` or `[1, 3, R, R]`.
    pub tensor: Array4<f32>,
    /// The `R x R` image the tensor was built from.
    pub image: RgbImage,
    /// Coordinate mapping back to the original frame.
    pub transform: ResizeTransform,
}

impl PreprocessResult {
    /// Input tensor for a `side x side` network input, resized from the `R x R` image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageError`] if the image cannot be resized.
    pub fn tensor_at(&self, side: u32, layout: TensorLayout) -> Result<Array4<f32>> {
        if side == self.transform.input_res {
            return Ok(self.tensor.clone());
        }
        let scaled = resize_rgb(&self.image, side, side)?;
        Ok(image_to_tensor(&scaled, layout))
    }
}

/// Preprocess a frame for the pose network.
///
/// # Arguments
///
/// * `image` - Input frame.
/// * `config` - Estimator configuration (resolution, resize mode, tensor layout).
///
/// # Errors
///
/// Returns [`PipelineError::ImageError`] if the frame is empty or cannot be resized.
pub fn preprocess_frame(image: &DynamicImage, config: &PoseConfig) -> Result<PreprocessResult> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(PipelineError::ImageError(format!(
            "cannot preprocess an empty {orig_width}x{orig_height} frame"
        )));
    }

    let rgb = image.to_rgb8();
    let res = config.input_res;
    let (resized, mode) = if config.pad_resize {
        let (padded, mode) = resize_with_pad(&rgb, res, config.pad_value)?;
        (padded, mode)
    } else {
        (resize_rgb(&rgb, res, res)?, ResizeMode::Stretch)
    };

    Ok(PreprocessResult {
        tensor: image_to_tensor(&resized, config.layout),
        image: resized,
        transform: ResizeTransform {
            orig_width,
            orig_height,
            input_res: res,
            mode,
        },
    })
}

/// Calculate the aspect-preserving size and centered padding for a square target.
///
/// Returns `(new_width, new_height, pad_left, pad_top)`.
#[must_use]
pub fn calculate_pad_params(orig_width: u32, orig_height: u32, target: u32) -> (u32, u32, u32, u32) {
    let longest = u64::from(orig_width.max(orig_height).max(1));
    let scaled = |side: u32| (u64::from(side) * u64::from(target) / longest) as u32;
    let new_width = scaled(orig_width).clamp(1, target);
    let new_height = scaled(orig_height).clamp(1, target);
    let pad_left = (target - new_width) / 2;
    let pad_top = (target - new_height) / 2;
    (new_width, new_height, pad_left, pad_top)
}

/// Resize keeping aspect ratio and pad to `target x target` with `pad_value`.
fn resize_with_pad(image: &RgbImage, target: u32, pad_value: u8) -> Result<(RgbImage, ResizeMode)> {
    let (w, h) = image.dimensions();
    let (new_width, new_height, pad_left, pad_top) = calculate_pad_params(w, h, target);

    let resized = resize_rgb(image, new_width, new_height)?;
    let mut canvas = RgbImage::from_pixel(target, target, image::Rgb([pad_value; 3]));
    image::imageops::replace(&mut canvas, &resized, i64::from(pad_left), i64::from(pad_top));

    Ok((
        canvas,
        ResizeMode::Pad {
            new_width,
            new_height,
            pad_top,
            pad_left,
        },
    ))
}

/// Bilinear resize of an RGB image.
///
/// # Errors
///
/// Returns [`PipelineError::ImageError`] if `fast_image_resize` rejects the buffers.
pub fn resize_rgb(image: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (width, height) {
        return Ok(image.clone());
    }

    let src = Image::from_vec_u8(src_w, src_h, image.as_raw().clone(), PixelType::U8x3)
        .map_err(|e| PipelineError::ImageError(format!("Failed to create source image: {e}")))?;
    let mut dst = Image::new(width, height, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| PipelineError::ImageError(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| PipelineError::ImageError("Failed to create resized buffer".to_string()))
}

/// Bicubic resize of a single-channel `f32` plane stored row-major.
///
/// # Errors
///
/// Returns [`PipelineError::ImageError`] if the plane does not match its size or cannot be resized.
pub fn resize_plane(
    data: &[f32],
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> Result<Vec<f32>> {
    if data.len() != (width * height) as usize {
        return Err(PipelineError::ImageError(format!(
            "plane of {} values does not match {width}x{height}",
            data.len()
        )));
    }
    if (width, height) == (new_width, new_height) {
        return Ok(data.to_vec());
    }

    let bytes: Vec<u8> = bytemuck::cast_slice::<f32, u8>(data).to_vec();
    let src = Image::from_vec_u8(width, height, bytes, PixelType::F32)
        .map_err(|e| PipelineError::ImageError(format!("Failed to create source plane: {e}")))?;
    let mut dst = Image::new(new_width, new_height, PixelType::F32);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| PipelineError::ImageError(format!("Failed to resize plane: {e}")))?;

    Ok(dst
        .into_vec()
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Convert an RGB image to a raw-valued (0..255) tensor in the requested layout.
#[must_use]
pub fn image_to_tensor(image: &RgbImage, layout: TensorLayout) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let pixels = image.as_raw();

    match layout {
        TensorLayout::Nhwc => {
            let data: Vec<f32> = pixels.iter().map(|&p| f32::from(p)).collect();
            Array4::from_shape_vec((1, h, w, 3), data).unwrap_or_else(|_| Array4::zeros((1, h, w, 3)))
        }
        TensorLayout::Nchw => {
            let mut tensor = Array4::zeros((1, 3, h, w));
            for (i, chunk) in pixels.chunks_exact(3).enumerate() {
                let (y, x) = (i / w, i % w);
                tensor[[0, 0, y, x]] = f32::from(chunk[0]);
                tensor[[0, 1, y, x]] = f32::from(chunk[1]);
                tensor[[0, 2, y, x]] = f32::from(chunk[2]);
            }
            tensor
        }
    }
}
