//! Geometric edit state: pan offset, scale and rotation.

use serde::{Deserialize, Serialize};

use crate::config::MIN_SCALE;

/// A 2D vector in frame units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Wrap an angle into `[0, 360)`.
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// The accumulated geometric transform of an edit session.
///
/// Translation is additive, scale is multiplicative and rotation is additive.
/// Scale never drops to or below zero, and rotation is kept in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    translation: Vec2,
    scale: f64,
    rotation_degrees: f64,
}

impl Default for TransformState {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformState {
    pub const fn identity() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: 1.0,
            rotation_degrees: 0.0,
        }
    }

    /// Build a state from raw values, enforcing the scale floor and
    /// rotation wrapping.
    pub fn new(translation: Vec2, scale: f64, rotation_degrees: f64) -> Self {
        Self::identity()
            .with_translation(translation)
            .with_scale(scale, MIN_SCALE)
            .with_rotation(rotation_degrees)
    }

    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Rotation in degrees, always in `[0, 360)`.
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    pub fn with_translation(mut self, translation: Vec2) -> Self {
        self.translation = translation;
        self
    }

    /// Replace the scale, holding it at or above `floor`.
    pub fn with_scale(mut self, scale: f64, floor: f64) -> Self {
        let floor = if floor > 0.0 { floor } else { MIN_SCALE };
        self.scale = if scale.is_nan() { floor } else { scale.max(floor) };
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_degrees = normalize_degrees(degrees);
        self
    }

    /// Add `degrees` to the current rotation.
    pub fn rotated_by(self, degrees: f64) -> Self {
        let current = self.rotation_degrees;
        self.with_rotation(current + degrees)
    }

    /// Compose `other` on top of this state: translations add, scales
    /// multiply, rotations add.
    pub fn compose(&self, other: &TransformState) -> TransformState {
        TransformState::identity()
            .with_translation(self.translation + other.translation)
            .with_scale(self.scale * other.scale, MIN_SCALE)
            .with_rotation(self.rotation_degrees + other.rotation_degrees)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// True when pan or zoom moved away from identity.
    pub fn has_view_change(&self) -> bool {
        self.translation != Vec2::ZERO || self.scale != 1.0
    }

    /// True when the rotation is not zero.
    pub fn has_rotation(&self) -> bool {
        self.rotation_degrees != 0.0
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: Rotation always reads inside [0, 360).
        #[test]
        fn prop_rotation_in_range(degrees in -100_000.0f64..100_000.0) {
            let state = TransformState::identity().with_rotation(degrees);
            prop_assert!(state.rotation_degrees() >= 0.0);
            prop_assert!(state.rotation_degrees() < 360.0);
        }

        /// Property: Scale is never below the floor.
        #[test]
        fn prop_scale_never_below_floor(scale in -10.0f64..10.0, floor in 0.01f64..1.0) {
            let state = TransformState::identity().with_scale(scale, floor);
            prop_assert!(state.scale() >= floor);
            prop_assert!(state.scale() > 0.0);
        }
    }
}
