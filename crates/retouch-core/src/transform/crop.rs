//! Cropping to the region visible inside the editor frame.
//!
//! Crop regions are normalized (0.0 to 1.0) relative to the image they are
//! applied to, so they stay valid whatever the pixel dimensions are.
//!
//! # Coordinate System
//!
//! - (0.0, 0.0) = top-left corner
//! - (1.0, 1.0) = bottom-right corner
//! - width/height are relative to the image dimensions

use serde::{Deserialize, Serialize};

use super::state::Vec2;
use crate::decode::DecodedImage;

/// A normalized crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    /// The whole image.
    pub const FULL: CropRegion = CropRegion {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Region of the image that is visible through the editor frame.
    ///
    /// The preview draws the image centered in a frame of `frame` size, then
    /// scales it by `scale` and moves it by `translation` (both in frame
    /// units). A frame point `q` therefore shows image point
    /// `(q - translation) / scale`, measured from the image center.
    ///
    /// Returns `None` when the visible region does not overlap the image.
    pub fn from_view(translation: Vec2, scale: f64, frame: (f64, f64)) -> Option<CropRegion> {
        let (frame_w, frame_h) = frame;
        if frame_w <= 0.0 || frame_h <= 0.0 || scale <= 0.0 {
            return None;
        }

        let half = 0.5 / scale;
        let center_x = 0.5 - translation.x / (scale * frame_w);
        let center_y = 0.5 - translation.y / (scale * frame_h);

        let left = (center_x - half).max(0.0);
        let right = (center_x + half).min(1.0);
        let top = (center_y - half).max(0.0);
        let bottom = (center_y + half).min(1.0);

        if right <= left || bottom <= top {
            return None;
        }

        Some(CropRegion::new(left, top, right - left, bottom - top))
    }

    /// True when the region covers the whole image.
    pub fn is_full(&self) -> bool {
        self.left <= 0.0 && self.top <= 0.0 && self.width >= 1.0 && self.height >= 1.0
    }
}

/// Crop an image to a normalized region.
///
/// # Behavior
///
/// - Coordinates outside the image are clamped to its bounds
/// - Minimum output dimension is 1x1 pixels
/// - A full region returns a copy of the source
pub fn apply_crop(image: &DecodedImage, region: &CropRegion) -> DecodedImage {
    if region.is_full() {
        return image.clone();
    }

    let src_w = image.width as f64;
    let src_h = image.height as f64;

    let px_left = (region.left.clamp(0.0, 1.0) * src_w).round() as u32;
    let px_top = (region.top.clamp(0.0, 1.0) * src_h).round() as u32;
    let px_width = (region.width.clamp(0.0, 1.0) * src_w).round() as u32;
    let px_height = (region.height.clamp(0.0, 1.0) * src_h).round() as u32;

    let px_left = px_left.min(image.width.saturating_sub(1));
    let px_top = px_top.min(image.height.saturating_sub(1));
    let px_right = (px_left + px_width).min(image.width);
    let px_bottom = (px_top + px_height).min(image.height);

    let out_width = px_right.saturating_sub(px_left).max(1);
    let out_height = px_bottom.saturating_sub(px_top).max(1);

    let row_bytes = (out_width * 3) as usize;
    let mut output = Vec::with_capacity(row_bytes * out_height as usize);

    for y in 0..out_height {
        let start = (((px_top + y) * image.width + px_left) * 3) as usize;
        output.extend_from_slice(&image.pixels[start..start + row_bytes]);
    }

    DecodedImage::new(out_width, out_height, output)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
