//! Timed transitions between transform states.
//!
//! Reset and the toolbar rotate action change the logical [`TransformState`]
//! at once, but the preview eases toward the new value. A [`Transition`] is
//! sampled by elapsed time and returns the exact target once finished.

use std::time::Duration;

use crate::transform::{TransformState, Vec2};

/// Easing curve for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    /// Fast start, gentle landing.
    #[default]
    EaseOutCubic,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
        }
    }
}

/// An in-flight animation from one transform to another.
///
/// Rotation is interpolated on an unwrapped angle so a step from 270 to 0
/// sweeps through 360 instead of spinning backward.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    from: TransformState,
    to: TransformState,
    rotation_from: f64,
    rotation_delta: f64,
    duration: Duration,
    elapsed: Duration,
    easing: Easing,
}

impl Transition {
    /// Animate from `from` to `to`, turning by `rotation_delta` degrees on
    /// the way.
    pub fn new(
        from: TransformState,
        to: TransformState,
        rotation_delta: f64,
        duration: Duration,
    ) -> Self {
        Self {
            from,
            to,
            rotation_from: from.rotation_degrees(),
            rotation_delta,
            duration,
            elapsed: Duration::ZERO,
            easing: Easing::default(),
        }
    }

    /// Animate back to identity, turning whichever way is shorter.
    pub fn reset(from: TransformState, duration: Duration) -> Self {
        let current = from.rotation_degrees();
        let delta = if current <= 180.0 {
            -current
        } else {
            360.0 - current
        };
        Self::new(from, TransformState::identity(), delta, duration)
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn target(&self) -> TransformState {
        self.to
    }

    /// Advance the clock.
    pub fn advance(&mut self, elapsed: Duration) {
        self.elapsed = self.elapsed.saturating_add(elapsed).min(self.duration);
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        self.elapsed.as_secs_f64() / self.duration.as_secs_f64()
    }

    /// State to draw right now.
    pub fn sample(&self) -> TransformState {
        if self.is_finished() {
            return self.to;
        }
        let t = self.easing.apply(self.progress());
        let lerp = |a: f64, b: f64| a + (b - a) * t;

        let from_t = self.from.translation();
        let to_t = self.to.translation();
        TransformState::new(
            Vec2::new(lerp(from_t.x, to_t.x), lerp(from_t.y, to_t.y)),
            lerp(self.from.scale(), self.to.scale()),
            self.rotation_from + self.rotation_delta * t,
        )
    }
}
