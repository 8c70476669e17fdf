//! Color adjustment algorithms
//!
//! Applies linear brightness, contrast and saturation to RGB pixel data.
//! Each adjustment is its own pass over the buffer; the commit pipeline runs
//! them in this order:
//! 1. Brightness
//! 2. Contrast
//! 3. Saturation
//!
//! All values range from -100 to +100 and 0 leaves the pixels untouched.

use serde::{Deserialize, Serialize};

/// One of the three adjustment sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
    Brightness,
    Contrast,
    Saturation,
}

impl ColorChannel {
    /// Channels in pipeline order.
    pub const ALL: [ColorChannel; 3] = [
        ColorChannel::Brightness,
        ColorChannel::Contrast,
        ColorChannel::Saturation,
    ];
}

impl std::fmt::Display for ColorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ColorChannel::Brightness => "brightness",
            ColorChannel::Contrast => "contrast",
            ColorChannel::Saturation => "saturation",
        })
    }
}

/// Apply a single adjustment to RGB pixel data in place.
///
/// # Arguments
/// * `pixels` - RGB pixel data (3 bytes per pixel, row-major order)
/// * `channel` - Which adjustment to apply
/// * `value` - Slider value (-100 to 100)
pub fn apply_adjustment(pixels: &mut [u8], channel: ColorChannel, value: f32) {
    if value == 0.0 {
        return;
    }

    let op: fn(f32, f32, f32, f32) -> (f32, f32, f32) = match channel {
        ColorChannel::Brightness => brightness,
        ColorChannel::Contrast => contrast,
        ColorChannel::Saturation => saturation,
    };

    for chunk in pixels.chunks_exact_mut(3) {
        let (r, g, b) = op(
            chunk[0] as f32 / 255.0,
            chunk[1] as f32 / 255.0,
            chunk[2] as f32 / 255.0,
            value,
        );
        chunk[0] = to_byte(r);
        chunk[1] = to_byte(g);
        chunk[2] = to_byte(b);
    }
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Shift every channel by `brightness / 100` of full scale.
///
/// Formula: `output = input + brightness/100`
#[inline]
fn brightness(r: f32, g: f32, b: f32, brightness: f32) -> (f32, f32, f32) {
    let offset = brightness / 100.0;
    (r + offset, g + offset, b + offset)
}

/// Stretch or compress values around mid-gray.
///
/// Formula: `output = (input - 0.5) * (1 + contrast/100) + 0.5`
#[inline]
fn contrast(r: f32, g: f32, b: f32, contrast: f32) -> (f32, f32, f32) {
    let factor = 1.0 + (contrast / 100.0);
    let midpoint = 0.5;
    (
        (r - midpoint) * factor + midpoint,
        (g - midpoint) * factor + midpoint,
        (b - midpoint) * factor + midpoint,
    )
}

/// Luminance using ITU-R BT.709 coefficients.
#[inline]
fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Push colors away from (or toward) their own luminance.
///
/// -100 is fully grayscale.
#[inline]
fn saturation(r: f32, g: f32, b: f32, saturation: f32) -> (f32, f32, f32) {
    let gray = luminance(r, g, b);
    let factor = 1.0 + (saturation / 100.0);
    (
        gray + (r - gray) * factor,
        gray + (g - gray) * factor,
        gray + (b - gray) * factor,
    )
}
