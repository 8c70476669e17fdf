//! Retouch Core - interactive image transform and adjustment engine
//!
//! This crate holds everything an image editor needs between "the user picked
//! a photo" and "here is the edited file": transform state driven by pan,
//! pinch and rotate gestures, brightness/contrast/saturation sliders, a live
//! preview matrix, and the asynchronous commit pipeline that bakes the edit
//! into a new image.
//!
//! It knows nothing about screens or uploads. A host feeds it gesture events
//! and slider values and receives either an output [`ImageRef`] or a cancel.

pub mod adjustments;
pub mod animation;
pub mod config;
pub mod decode;
pub mod editor;
pub mod encode;
pub mod gesture;
pub mod pipeline;
pub mod preview;
pub mod session;
pub mod store;
pub mod transform;

use tracing::warn;

pub use adjustments::{apply_adjustment, ColorChannel};
pub use config::{ConfigError, EditorConfig};
pub use editor::{
    CancelDisposition, Editor, EditorDelegate, EditorError, EditorState, SaveOutcome,
};
pub use encode::OutputFormat;
pub use gesture::{GestureError, GestureEvent, GestureInterpreter, GesturePhase};
pub use pipeline::{CommitError, CommitOutput, CommitPipeline, CommitResult, NativeProcessor};
pub use preview::{preview_transform, Affine2D, FrameSize, PreviewSurface};
pub use session::{EditSession, EditingMode, SessionError};
pub use store::{ImageRef, ImageStore, MemoryImageStore, StoreError};
pub use transform::{TransformState, Vec2};

#[cfg(not(target_arch = "wasm32"))]
pub use store::FsImageStore;

/// Color adjustments for an edit session.
///
/// Each channel is an absolute value in `[-100, 100]`, read once when the
/// edit is committed. Channels never affect one another.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdjustmentState {
    /// Brightness (-100 to 100)
    brightness: f32,
    /// Contrast (-100 to 100)
    contrast: f32,
    /// Saturation (-100 to 100)
    saturation: f32,
}

impl AdjustmentState {
    /// Create a new AdjustmentState with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn get(&self, channel: ColorChannel) -> f32 {
        match channel {
            ColorChannel::Brightness => self.brightness,
            ColorChannel::Contrast => self.contrast,
            ColorChannel::Saturation => self.saturation,
        }
    }

    /// Set one channel, clamped into `[-100, 100]`.
    ///
    /// Non-finite values are ignored and the channel keeps its value.
    pub fn set(&mut self, channel: ColorChannel, value: f32) {
        if !value.is_finite() {
            warn!(%channel, value, "ignoring non-finite adjustment");
            return;
        }
        let value = value.clamp(config::ADJUSTMENT_MIN, config::ADJUSTMENT_MAX);
        match channel {
            ColorChannel::Brightness => self.brightness = value,
            ColorChannel::Contrast => self.contrast = value,
            ColorChannel::Saturation => self.saturation = value,
        }
    }

    pub fn set_brightness(&mut self, value: f32) {
        self.set(ColorChannel::Brightness, value);
    }

    pub fn set_contrast(&mut self, value: f32) {
        self.set(ColorChannel::Contrast, value);
    }

    pub fn set_saturation(&mut self, value: f32) {
        self.set(ColorChannel::Saturation, value);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check if all values are at their defaults
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Non-zero channels with their values, in pipeline order.
    pub fn non_default_channels(&self) -> impl Iterator<Item = (ColorChannel, f32)> + '_ {
        ColorChannel::ALL
            .into_iter()
            .map(|channel| (channel, self.get(channel)))
            .filter(|(_, value)| *value != 0.0)
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
