//! Editor configuration.
//!
//! The engine's numeric behavior is driven by a handful of constants. They are
//! collected in [`EditorConfig`] so a host can override them, but the defaults
//! are the values every shipped editor uses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower bound of every adjustment slider.
pub const ADJUSTMENT_MIN: f32 = -100.0;

/// Upper bound of every adjustment slider.
pub const ADJUSTMENT_MAX: f32 = 100.0;

/// Lossy re-encode quality (0.0 to 1.0).
pub const DEFAULT_ENCODE_QUALITY: f32 = 0.8;

/// Rotation added by a single toolbar rotate action.
pub const ROTATION_STEP_DEGREES: f64 = 90.0;

/// Smallest scale a pinch gesture may reach.
pub const MIN_SCALE: f64 = 0.1;

/// Duration of the reset and rotate transitions.
pub const TRANSITION_MS: u64 = 250;

/// Errors from validating an [`EditorConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A numeric field is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// The adjustment range is empty or inverted.
    #[error("adjustment range [{min}, {max}] is empty")]
    EmptyAdjustmentRange { min: f32, max: f32 },

    /// Encode quality outside (0, 1].
    #[error("encode quality {0} must be in (0, 1]")]
    InvalidQuality(f32),

    /// Scale floor must be strictly positive.
    #[error("minimum scale {0} must be greater than zero")]
    InvalidMinScale(f64),
}

/// Tunable constants for one editor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Lower bound applied to brightness, contrast and saturation.
    pub adjustment_min: f32,
    /// Upper bound applied to brightness, contrast and saturation.
    pub adjustment_max: f32,
    /// Lossy re-encode quality (0.0 to 1.0).
    pub encode_quality: f32,
    /// Degrees added by [`rotate_step`](crate::session::EditSession::rotate_step).
    pub rotation_step_degrees: f64,
    /// Floor for the pinch scale.
    pub min_scale: f64,
    /// Length of reset/rotate transitions in milliseconds.
    pub transition_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            adjustment_min: ADJUSTMENT_MIN,
            adjustment_max: ADJUSTMENT_MAX,
            encode_quality: DEFAULT_ENCODE_QUALITY,
            rotation_step_degrees: ROTATION_STEP_DEGREES,
            min_scale: MIN_SCALE,
            transition_ms: TRANSITION_MS,
        }
    }
}

impl EditorConfig {
    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.adjustment_min.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "adjustment_min",
            });
        }
        if !self.adjustment_max.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "adjustment_max",
            });
        }
        if !self.rotation_step_degrees.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "rotation_step_degrees",
            });
        }
        if self.adjustment_min >= self.adjustment_max {
            return Err(ConfigError::EmptyAdjustmentRange {
                min: self.adjustment_min,
                max: self.adjustment_max,
            });
        }
        if !(self.encode_quality > 0.0 && self.encode_quality <= 1.0) {
            return Err(ConfigError::InvalidQuality(self.encode_quality));
        }
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            return Err(ConfigError::InvalidMinScale(self.min_scale));
        }
        Ok(())
    }

    /// Encode quality as the JPEG encoder's 1-100 scale.
    pub fn quality_percent(&self) -> u8 {
        (self.encode_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Clamp an adjustment value into the configured range.
    #[inline]
    pub fn clamp_adjustment(&self, value: f32) -> f32 {
        value.clamp(self.adjustment_min, self.adjustment_max)
    }
}
