//! Image rotation for export.
//!
//! Positive angles rotate clockwise, the same direction the preview uses.
//! Quarter turns move pixels exactly; any other angle is resampled with
//! inverse mapping onto an expanded canvas:
//!
//! ```text
//! src_x = (dst_x - cx) * cos(θ) - (dst_y - cy) * sin(θ) + src_cx
//! src_y = (dst_x - cx) * sin(θ) + (dst_y - cy) * cos(θ) + src_cy
//! ```
//!
//! with θ = -angle, because image rows grow downward.

use image::imageops;

use super::state::normalize_degrees;
use crate::decode::DecodedImage;

const ANGLE_EPSILON: f64 = 0.001;

/// Interpolation filter for arbitrary-angle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationFilter {
    /// Fast bilinear interpolation.
    #[default]
    Bilinear,
    /// High-quality Lanczos3 interpolation, used for export.
    Lanczos3,
}

/// A rotation that is an exact multiple of 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl QuarterTurn {
    /// Classify an angle, or `None` if it is not a quarter turn.
    pub fn from_degrees(degrees: f64) -> Option<QuarterTurn> {
        let normalized = normalize_degrees(degrees);
        let near = |target: f64| (normalized - target).abs() < ANGLE_EPSILON;

        if near(0.0) || near(360.0) {
            Some(QuarterTurn::None)
        } else if near(90.0) {
            Some(QuarterTurn::Cw90)
        } else if near(180.0) {
            Some(QuarterTurn::Cw180)
        } else if near(270.0) {
            Some(QuarterTurn::Cw270)
        } else {
            None
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, QuarterTurn::Cw90 | QuarterTurn::Cw270)
    }
}

/// Size of the box that holds a `width` x `height` rectangle rotated by
/// `angle_degrees`.
pub fn rotated_extent(width: f64, height: f64, angle_degrees: f64) -> (f64, f64) {
    match QuarterTurn::from_degrees(angle_degrees) {
        Some(turn) if turn.swaps_dimensions() => (height, width),
        Some(_) => (width, height),
        None => {
            let angle = angle_degrees.to_radians();
            let (sin, cos) = (angle.sin().abs(), angle.cos().abs());
            (width * cos + height * sin, width * sin + height * cos)
        }
    }
}

/// Pixel dimensions of an image after rotation (never zero).
pub fn compute_rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let (w, h) = rotated_extent(width as f64, height as f64, angle_degrees);
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Rotate an image clockwise around its center.
///
/// The canvas grows to hold the whole rotated image; uncovered corners are
/// black.
pub fn apply_rotation(
    image: &DecodedImage,
    angle_degrees: f64,
    filter: InterpolationFilter,
) -> DecodedImage {
    if let Some(turn) = QuarterTurn::from_degrees(angle_degrees) {
        return rotate_quarter(image, turn);
    }

    let (src_w, src_h) = (image.width as f64, image.height as f64);
    let (dst_w, dst_h) = compute_rotated_bounds(image.width, image.height, angle_degrees);

    let angle_rad = -angle_degrees.to_radians();
    let cos = angle_rad.cos();
    let sin = angle_rad.sin();

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let mut output = Vec::with_capacity((dst_w * dst_h * 3) as usize);

    for dst_y in 0..dst_h {
        let dy = dst_y as f64 - dst_cy;
        for dst_x in 0..dst_w {
            let dx = dst_x as f64 - dst_cx;
            let src_x = dx * cos - dy * sin + src_cx;
            let src_y = dx * sin + dy * cos + src_cy;

            let pixel = match filter {
                InterpolationFilter::Bilinear => sample_bilinear(image, src_x, src_y),
                InterpolationFilter::Lanczos3 => sample_lanczos3(image, src_x, src_y),
            };
            output.extend_from_slice(&pixel);
        }
    }

    DecodedImage::new(dst_w, dst_h, output)
}

fn rotate_quarter(image: &DecodedImage, turn: QuarterTurn) -> DecodedImage {
    let Some(rgb) = image.to_rgb_image() else {
        return image.clone();
    };
    let rotated = match turn {
        QuarterTurn::None => return image.clone(),
        QuarterTurn::Cw90 => imageops::rotate90(&rgb),
        QuarterTurn::Cw180 => imageops::rotate180(&rgb),
        QuarterTurn::Cw270 => imageops::rotate270(&rgb),
    };
    DecodedImage::from_rgb_image(rotated)
}

#[inline]
fn pixel_f64(image: &DecodedImage, px: usize, py: usize) -> [f64; 3] {
    let idx = (py * image.width as usize + px) * 3;
    [
        image.pixels[idx] as f64,
        image.pixels[idx + 1] as f64,
        image.pixels[idx + 2] as f64,
    ]
}

/// Weighted mix of the 4 nearest pixels; black outside the image.
fn sample_bilinear(image: &DecodedImage, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width as i64, image.height as i64);
    if x < 0.0 || x >= (w - 1) as f64 || y < 0.0 || y >= (h - 1) as f64 {
        return [0, 0, 0];
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = pixel_f64(image, x0, y0);
    let p10 = pixel_f64(image, x0 + 1, y0);
    let p01 = pixel_f64(image, x0, y0 + 1);
    let p11 = pixel_f64(image, x0 + 1, y0 + 1);

    std::array::from_fn(|i| {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        v.clamp(0.0, 255.0).round() as u8
    })
}

/// Lanczos3 over a 6x6 neighborhood, bilinear near the edges.
fn sample_lanczos3(image: &DecodedImage, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width as i64, image.height as i64);
    if x < 2.0 || x >= (w - 3) as f64 || y < 2.0 || y >= (h - 3) as f64 {
        return sample_bilinear(image, x, y);
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;

    let mut sum = [0.0f64; 3];
    let mut weight_sum = 0.0;

    for py in (y0 - 2)..=(y0 + 3) {
        let wy = lanczos_weight(y - py as f64, 3.0);
        for px in (x0 - 2)..=(x0 + 3) {
            let weight = lanczos_weight(x - px as f64, 3.0) * wy;
            let pixel = pixel_f64(image, px as usize, py as usize);
            for (acc, value) in sum.iter_mut().zip(pixel) {
                *acc += value * weight;
            }
            weight_sum += weight;
        }
    }

    if weight_sum <= 0.0 {
        return [0, 0, 0];
    }
    sum.map(|v| (v / weight_sum).clamp(0.0, 255.0).round() as u8)
}

/// `sinc(x) * sinc(x / a)` for `|x| < a`, zero outside.
fn lanczos_weight(x: f64, a: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let pi_x = std::f64::consts::PI * x;
    (a * pi_x.sin() * (pi_x / a).sin()) / (pi_x * pi_x)
}
