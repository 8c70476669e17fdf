//! One edit interaction: source, transform, adjustments and editing mode.
//!
//! The session is the only mutable state of the engine. Gestures and slider
//! changes are applied synchronously. While a commit is in flight every
//! mutator is refused so the pipeline's snapshot cannot race an edit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adjustments::ColorChannel;
use crate::animation::Transition;
use crate::config::{ConfigError, EditorConfig};
use crate::gesture::{GestureError, GestureEvent, GestureInterpreter, GesturePhase};
use crate::pipeline::{CommitError, CommitSnapshot};
use crate::preview::{preview_transform, Affine2D, FrameSize, PreviewSurface};
use crate::store::ImageRef;
use crate::transform::TransformState;
use crate::AdjustmentState;

/// Which control surface is showing. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditingMode {
    #[default]
    None,
    Crop,
    Adjust,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid editor config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gesture(#[from] GestureError),

    /// Controls are disabled until the pending commit resolves.
    #[error("edits are locked while a commit is in progress")]
    CommitInFlight,
}

/// Clears the session's in-flight flag when dropped.
#[derive(Debug)]
pub struct CommitGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for CommitGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A started commit: the state to export and the lock on the session.
#[derive(Debug)]
pub struct CommitRequest {
    pub snapshot: CommitSnapshot,
    pub guard: CommitGuard,
}

/// State of one editor invocation.
#[derive(Debug)]
pub struct EditSession {
    id: Uuid,
    source: ImageRef,
    config: EditorConfig,
    transform: TransformState,
    adjustments: AdjustmentState,
    mode: EditingMode,
    frame: Option<FrameSize>,
    gestures: GestureInterpreter,
    transition: Option<Transition>,
    committing: Arc<AtomicBool>,
}

impl EditSession {
    /// Start a session on `source`. The source is not read here.
    pub fn new(source: ImageRef, config: EditorConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let id = Uuid::new_v4();
        debug!(session = %id, source = %source, "edit session created");

        Ok(Self {
            id,
            source,
            gestures: GestureInterpreter::new(config.min_scale),
            config,
            transform: TransformState::identity(),
            adjustments: AdjustmentState::new(),
            mode: EditingMode::None,
            frame: None,
            transition: None,
            committing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &ImageRef {
        &self.source
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Logical transform, what a commit would export.
    pub fn transform(&self) -> TransformState {
        self.transform
    }

    pub fn adjustments(&self) -> AdjustmentState {
        self.adjustments
    }

    pub fn mode(&self) -> EditingMode {
        self.mode
    }

    pub fn frame(&self) -> Option<FrameSize> {
        self.frame
    }

    /// False while a commit is in flight.
    pub fn controls_enabled(&self) -> bool {
        !self.committing.load(Ordering::Acquire)
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        if self.controls_enabled() {
            Ok(())
        } else {
            warn!(session = %self.id, "edit rejected while committing");
            Err(SessionError::CommitInFlight)
        }
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Feed one gesture event. Starting a gesture stops a running transition.
    pub fn apply_gesture(&mut self, event: GestureEvent) -> Result<TransformState, SessionError> {
        self.ensure_editable()?;

        let starting = matches!(
            event,
            GestureEvent::Pan(GesturePhase::Start)
                | GestureEvent::Pinch(GesturePhase::Start)
                | GestureEvent::Rotate(GesturePhase::Start)
        );
        let next = self.gestures.apply(self.transform, event)?;
        if starting {
            self.transition = None;
        }
        self.transform = next;
        Ok(next)
    }

    /// Toolbar rotate: add one rotation step, animated.
    pub fn rotate_step(&mut self) -> Result<TransformState, SessionError> {
        self.ensure_editable()?;

        let step = self.config.rotation_step_degrees;
        let from = self.displayed_transform();
        let to = self.transform.rotated_by(step);
        let delta = turn_toward(from.rotation_degrees(), to.rotation_degrees(), step);

        self.transition = Some(Transition::new(from, to, delta, self.transition_duration()));
        self.gestures.shift_rotation(step);
        self.transform = to;
        debug!(session = %self.id, rotation = to.rotation_degrees(), "rotated");
        Ok(to)
    }

    /// Animate back to identity. The logical state is exact identity at once.
    pub fn reset_transform(&mut self) -> Result<TransformState, SessionError> {
        self.ensure_editable()?;

        let from = self.displayed_transform();
        self.gestures.clear();
        self.transition = Some(Transition::reset(from, self.transition_duration()));
        self.transform = TransformState::identity();
        debug!(session = %self.id, "transform reset");
        Ok(self.transform)
    }

    fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.config.transition_ms)
    }

    /// Advance the running transition and return what to draw.
    pub fn tick(&mut self, elapsed: Duration) -> TransformState {
        if let Some(transition) = &mut self.transition {
            transition.advance(elapsed);
            if transition.is_finished() {
                self.transition = None;
            }
        }
        self.displayed_transform()
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Transform the preview shows right now.
    pub fn displayed_transform(&self) -> TransformState {
        match &self.transition {
            Some(transition) => transition.sample(),
            None => self.transform,
        }
    }

    /// Preview matrix for the displayed transform.
    pub fn preview_transform(&self) -> Affine2D {
        preview_transform(&self.displayed_transform())
    }

    /// Record the laid-out preview frame. Translation is measured in it.
    pub fn set_frame(&mut self, frame: Option<FrameSize>) {
        self.frame = frame.filter(FrameSize::is_valid);
    }

    pub fn attach_preview(&mut self, surface: &PreviewSurface) {
        self.set_frame(surface.frame());
    }

    // ------------------------------------------------------------------
    // Adjustments
    // ------------------------------------------------------------------

    pub fn set_adjustment(
        &mut self,
        channel: ColorChannel,
        value: f32,
    ) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.adjustments
            .set(channel, self.config.clamp_adjustment(value));
        Ok(())
    }

    pub fn set_brightness(&mut self, value: f32) -> Result<(), SessionError> {
        self.set_adjustment(ColorChannel::Brightness, value)
    }

    pub fn set_contrast(&mut self, value: f32) -> Result<(), SessionError> {
        self.set_adjustment(ColorChannel::Contrast, value)
    }

    pub fn set_saturation(&mut self, value: f32) -> Result<(), SessionError> {
        self.set_adjustment(ColorChannel::Saturation, value)
    }

    pub fn reset_adjustments(&mut self) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.adjustments.reset();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: EditingMode) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.mode = mode;
        Ok(())
    }

    /// Show `mode`, or hide it if it is already showing.
    pub fn toggle_mode(&mut self, mode: EditingMode) -> Result<EditingMode, SessionError> {
        self.ensure_editable()?;
        self.mode = if self.mode == mode {
            EditingMode::None
        } else {
            mode
        };
        Ok(self.mode)
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Copy the state a commit exports.
    pub fn snapshot(&self) -> CommitSnapshot {
        CommitSnapshot {
            session_id: self.id,
            source: self.source.clone(),
            transform: self.transform,
            adjustments: self.adjustments,
            frame: self.frame,
        }
    }

    /// Snapshot the session and lock it until the returned guard drops.
    pub fn begin_commit(&self) -> Result<CommitRequest, CommitError> {
        if self
            .committing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(session = %self.id, "commit already in progress");
            return Err(CommitError::AlreadyInProgress);
        }
        Ok(CommitRequest {
            snapshot: self.snapshot(),
            guard: CommitGuard {
                flag: Arc::clone(&self.committing),
            },
        })
    }
}

/// Signed turn from `from` to `to` in the direction of `step`.
fn turn_toward(from: f64, to: f64, step: f64) -> f64 {
    let forward = (to - from).rem_euclid(360.0);
    if step >= 0.0 || forward == 0.0 {
        forward
    } else {
        forward - 360.0
    }
}
