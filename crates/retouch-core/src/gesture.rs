//! Gesture interpreter.
//!
//! Turns phased pointer gestures into [`TransformState`] updates. Each axis
//! (pan, pinch, rotate) captures a baseline when its gesture starts and every
//! `Active` event recomputes the value from that baseline and the gesture's
//! cumulative payload:
//!
//! - pan: `baseline + translation_since_start`
//! - pinch: `baseline * live_scale_factor` (floored at the minimum scale)
//! - rotate: `baseline + angle_since_start`
//!
//! Recomputing from the baseline keeps the result independent of how many
//! `Active` events the host delivers. Different axes may be active at the
//! same time; the same axis may not be started twice.

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MIN_SCALE;
use crate::transform::{TransformState, Vec2};

/// Phase of a continuous gesture, carrying the cumulative payload while
/// active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GesturePhase<T> {
    /// The recognizer began tracking.
    Start,
    /// Cumulative value since `Start`.
    Active(T),
    /// The gesture finished normally.
    End,
    /// The host cut the gesture short (app backgrounded, touch cancelled).
    Interrupted,
}

/// A raw gesture event from the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Drag with the cumulative translation since start.
    Pan(GesturePhase<Vec2>),
    /// Two-finger pinch with the live scale factor since start.
    Pinch(GesturePhase<f64>),
    /// Two-finger twist with the angle in degrees since start.
    Rotate(GesturePhase<f64>),
}

impl GestureEvent {
    pub fn kind(&self) -> GestureKind {
        match self {
            GestureEvent::Pan(_) => GestureKind::Pan,
            GestureEvent::Pinch(_) => GestureKind::Pinch,
            GestureEvent::Rotate(_) => GestureKind::Rotate,
        }
    }
}

/// Which transform axis a gesture drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Pan,
    Pinch,
    Rotate,
}

impl std::fmt::Display for GestureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GestureKind::Pan => "pan",
            GestureKind::Pinch => "pinch",
            GestureKind::Rotate => "rotate",
        })
    }
}

/// Malformed event sequences. A well-behaved host never produces these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GestureError {
    #[error("{0} gesture received an update before it started")]
    NotStarted(GestureKind),

    #[error("{0} gesture started while one is already active")]
    AlreadyActive(GestureKind),

    #[error("{0} gesture payload is not a finite number")]
    NonFinite(GestureKind),
}

/// Baseline captured at `Start`.
#[derive(Debug, Clone, Copy)]
struct Session<T> {
    baseline: T,
}

/// Stateful interpreter holding the per-axis gesture baselines.
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    min_scale: f64,
    pan: Option<Session<Vec2>>,
    pinch: Option<Session<f64>>,
    rotate: Option<Session<f64>>,
}

impl Default for GestureInterpreter {
    fn default() -> Self {
        Self::new(MIN_SCALE)
    }
}

impl GestureInterpreter {
    pub fn new(min_scale: f64) -> Self {
        Self {
            min_scale,
            pan: None,
            pinch: None,
            rotate: None,
        }
    }

    /// True while any gesture is between `Start` and `End`.
    pub fn is_active(&self) -> bool {
        self.pan.is_some() || self.pinch.is_some() || self.rotate.is_some()
    }

    pub fn is_axis_active(&self, kind: GestureKind) -> bool {
        match kind {
            GestureKind::Pan => self.pan.is_some(),
            GestureKind::Pinch => self.pinch.is_some(),
            GestureKind::Rotate => self.rotate.is_some(),
        }
    }

    /// Forget every in-progress gesture. The state keeps its current values.
    pub fn clear(&mut self) {
        self.pan = None;
        self.pinch = None;
        self.rotate = None;
    }

    /// Move the rotate baseline by `degrees` if a rotate gesture is active.
    ///
    /// Rotation applied outside the gesture (a toolbar step) then survives
    /// the gesture's next update instead of being recomputed away.
    pub fn shift_rotation(&mut self, degrees: f64) {
        if let Some(session) = &mut self.rotate {
            session.baseline += degrees;
        }
    }

    /// Apply one event, returning the updated state.
    ///
    /// `End` and `Interrupted` both keep the last value produced by an
    /// `Active` event; nothing is reverted.
    pub fn apply(
        &mut self,
        state: TransformState,
        event: GestureEvent,
    ) -> Result<TransformState, GestureError> {
        let result = match event {
            GestureEvent::Pan(phase) => step(
                &mut self.pan,
                GestureKind::Pan,
                phase,
                state.translation(),
                |base, delta: Vec2| delta.is_finite().then(|| base + delta),
            )
            .map(|translation| state.with_translation(translation)),
            GestureEvent::Pinch(phase) => {
                let min_scale = self.min_scale;
                step(
                    &mut self.pinch,
                    GestureKind::Pinch,
                    phase,
                    state.scale(),
                    |base, factor: f64| factor.is_finite().then(|| (base * factor).max(min_scale)),
                )
                .map(|scale| state.with_scale(scale, min_scale))
            }
            GestureEvent::Rotate(phase) => step(
                &mut self.rotate,
                GestureKind::Rotate,
                phase,
                state.rotation_degrees(),
                |base, angle: f64| angle.is_finite().then(|| base + angle),
            )
            .map(|degrees| state.with_rotation(degrees)),
        };

        if let Err(err) = &result {
            warn!(error = %err, "rejected gesture event");
        }
        result
    }
}

/// Advance one axis. `current` is the axis value in the incoming state and
/// becomes the baseline on `Start`; it is returned untouched on `End`.
fn step<T, P, F>(
    slot: &mut Option<Session<T>>,
    kind: GestureKind,
    phase: GesturePhase<P>,
    current: T,
    compose: F,
) -> Result<T, GestureError>
where
    T: Copy + std::fmt::Debug,
    F: FnOnce(T, P) -> Option<T>,
{
    match phase {
        GesturePhase::Start => {
            if slot.is_some() {
                return Err(GestureError::AlreadyActive(kind));
            }
            debug!(gesture = %kind, baseline = ?current, "gesture started");
            *slot = Some(Session { baseline: current });
            Ok(current)
        }
        GesturePhase::Active(payload) => {
            let session = slot.as_ref().ok_or(GestureError::NotStarted(kind))?;
            compose(session.baseline, payload).ok_or(GestureError::NonFinite(kind))
        }
        GesturePhase::End | GesturePhase::Interrupted => {
            if slot.take().is_none() {
                return Err(GestureError::NotStarted(kind));
            }
            if matches!(phase, GesturePhase::Interrupted) {
                debug!(
                    gesture = %kind,
                    value = ?current,
                    "gesture interrupted, keeping last value"
                );
            } else {
                debug!(gesture = %kind, value = ?current, "gesture ended");
            }
            Ok(current)
        }
    }
}

/// Fold a sequence of events into a state with a fresh interpreter.
pub fn apply_gesture_events<I>(
    state: TransformState,
    events: I,
    min_scale: f64,
) -> Result<TransformState, GestureError>
where
    I: IntoIterator<Item = GestureEvent>,
{
    let mut interpreter = GestureInterpreter::new(min_scale);
    events
        .into_iter()
        .try_fold(state, |state, event| interpreter.apply(state, event))
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: A pan ends at baseline + last delta, however many
        /// updates came before it.
        #[test]
        fn prop_pan_has_no_drift(
            deltas in prop::collection::vec((-500.0f64..500.0, -500.0f64..500.0), 1..20),
        ) {
            let mut events = vec![GestureEvent::Pan(GesturePhase::Start)];
            events.extend(
                deltas
                    .iter()
                    .map(|&(x, y)| GestureEvent::Pan(GesturePhase::Active(Vec2::new(x, y)))),
            );
            events.push(GestureEvent::Pan(GesturePhase::End));

            let state =
                apply_gesture_events(TransformState::identity(), events, MIN_SCALE).unwrap();
            let (last_x, last_y) = deltas[deltas.len() - 1];
            prop_assert_eq!(state.translation(), Vec2::new(last_x, last_y));
        }

        /// Property: No pinch sequence drives scale below the floor.
        #[test]
        fn prop_pinch_never_below_floor(
            sessions in prop::collection::vec(
                prop::collection::vec(-1.0f64..3.0, 1..6),
                1..6,
            ),
        ) {
            let mut interpreter = GestureInterpreter::default();
            let mut state = TransformState::identity();
            for factors in sessions {
                state = interpreter.apply(state, GestureEvent::Pinch(GesturePhase::Start)).unwrap();
                for factor in factors {
                    state = interpreter
                        .apply(state, GestureEvent::Pinch(GesturePhase::Active(factor)))
                        .unwrap();
                    prop_assert!(state.scale() >= MIN_SCALE);
                }
                state = interpreter.apply(state, GestureEvent::Pinch(GesturePhase::End)).unwrap();
            }
            prop_assert!(state.scale() >= MIN_SCALE);
        }
    }
}
