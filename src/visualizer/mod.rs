// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Body model constants and drawing palettes.

/// Color definitions and palettes.
pub mod color;

/// BODY_25 joints, limbs and PAF channel layout.
pub mod skeleton;

pub use color::Color;
