//! Edit session WASM bindings.
//!
//! One `JsEditSession` backs one editor screen. The host forwards its
//! gesture recognizers and sliders here and applies `preview_matrix()` (or
//! `preview_css()`) to the displayed image after every change.
//!
//! # Example
//!
//! ```typescript
//! import { JsEditSession } from '@retouch/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const session = new JsEditSession(bytes, { transition_ms: 200 });
//! const layout = session.init_preview(view.clientWidth, view.clientHeight);
//!
//! pan.onStart(() => session.pan_start());
//! pan.onUpdate((e) => {
//!   session.pan_update(e.translationX, e.translationY);
//!   img.style.transform = session.preview_css();
//! });
//! pan.onEnd(() => session.pan_end());
//!
//! const output = session.commit();
//! upload(new Blob([output.bytes()], { type: output.mime_type }));
//! ```
//!
//! Cancelling needs no call: the host drops the session (`free()`), which
//! has no side effects.

use std::sync::Arc;
use std::time::Duration;

use futures::executor::block_on;
use retouch_core::gesture::{GestureEvent, GesturePhase};
use retouch_core::pipeline::CommitPipeline;
use retouch_core::preview::{FrameSize, PreviewSurface};
use retouch_core::session::EditSession;
use retouch_core::store::MemoryImageStore;
use retouch_core::transform::Vec2;
use retouch_core::EditorConfig;
use wasm_bindgen::prelude::*;

use crate::types::{mode_from_str, mode_to_str, JsCommitOutput, JsPreviewLayout};
use crate::to_js_error;

/// Interactive edit session for JavaScript.
#[wasm_bindgen]
pub struct JsEditSession {
    session: EditSession,
    store: Arc<MemoryImageStore>,
    pipeline: CommitPipeline<MemoryImageStore>,
    source: Vec<u8>,
}

#[wasm_bindgen]
impl JsEditSession {
    /// Start a session on the source image bytes.
    ///
    /// # Arguments
    /// * `source` - Encoded source image (JPEG or PNG)
    /// * `config` - Optional partial `EditorConfig` object; missing fields
    ///   take their defaults
    ///
    /// # Errors
    /// Returns an error if the config object is malformed or out of range.
    /// The source bytes are not decoded until the preview or a commit needs
    /// them.
    #[wasm_bindgen(constructor)]
    pub fn new(source: Vec<u8>, config: JsValue) -> Result<JsEditSession, JsValue> {
        let config: EditorConfig = if config.is_undefined() || config.is_null() {
            EditorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| to_js_error(format!("Invalid editor config: {e}")))?
        };
        Self::with_config(source, config).map_err(to_js_error)
    }

    /// Probe the source and fit it into the host viewport.
    ///
    /// Never throws: an unreadable source gives a layout with `ready == false`
    /// and the reason is also logged to the browser console.
    pub fn init_preview(&mut self, viewport_width: f64, viewport_height: f64) -> JsPreviewLayout {
        let surface = PreviewSurface::from_bytes(
            &self.source,
            FrameSize::new(viewport_width, viewport_height),
        );
        if let PreviewSurface::Blank { reason } = &surface {
            warn_console(&format!("retouch: preview unavailable: {reason}"));
        }
        self.session.attach_preview(&surface);
        JsPreviewLayout::from(&surface)
    }

    // =========================================================================
    // Gestures
    // =========================================================================

    pub fn pan_start(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pan(GesturePhase::Start))
    }

    /// Cumulative drag since `pan_start`, in frame units.
    pub fn pan_update(&mut self, dx: f64, dy: f64) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pan(GesturePhase::Active(Vec2::new(dx, dy))))
    }

    pub fn pan_end(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pan(GesturePhase::End))
    }

    /// The recognizer was cancelled; the last update is kept.
    pub fn pan_interrupt(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pan(GesturePhase::Interrupted))
    }

    pub fn pinch_start(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pinch(GesturePhase::Start))
    }

    /// Live scale factor since `pinch_start`.
    pub fn pinch_update(&mut self, factor: f64) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pinch(GesturePhase::Active(factor)))
    }

    pub fn pinch_end(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pinch(GesturePhase::End))
    }

    pub fn pinch_interrupt(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Pinch(GesturePhase::Interrupted))
    }

    pub fn rotate_start(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Rotate(GesturePhase::Start))
    }

    /// Twist in degrees since `rotate_start`, clockwise positive.
    pub fn rotate_update(&mut self, degrees: f64) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Rotate(GesturePhase::Active(degrees)))
    }

    pub fn rotate_end(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Rotate(GesturePhase::End))
    }

    pub fn rotate_interrupt(&mut self) -> Result<(), JsValue> {
        self.gesture(GestureEvent::Rotate(GesturePhase::Interrupted))
    }

    // =========================================================================
    // Toolbar
    // =========================================================================

    /// Rotate by one step (90 degrees by default), animated.
    pub fn rotate_step(&mut self) -> Result<(), JsValue> {
        self.session.rotate_step().map(drop).map_err(to_js_error)
    }

    /// Animate pan, zoom and rotation back to identity.
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.session.reset_transform().map(drop).map_err(to_js_error)
    }

    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode = parse_mode(mode)?;
        self.session.set_mode(mode).map_err(to_js_error)
    }

    /// Show `mode`, or hide it when it is already showing. Returns the new mode.
    pub fn toggle_mode(&mut self, mode: &str) -> Result<String, JsValue> {
        let mode = parse_mode(mode)?;
        self.session
            .toggle_mode(mode)
            .map(|mode| mode_to_str(mode).to_string())
            .map_err(to_js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        mode_to_str(self.session.mode()).to_string()
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    #[wasm_bindgen(getter)]
    pub fn brightness(&self) -> f32 {
        self.session.adjustments().brightness()
    }

    pub fn set_brightness(&mut self, value: f32) -> Result<(), JsValue> {
        self.session.set_brightness(value).map_err(to_js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn contrast(&self) -> f32 {
        self.session.adjustments().contrast()
    }

    pub fn set_contrast(&mut self, value: f32) -> Result<(), JsValue> {
        self.session.set_contrast(value).map_err(to_js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn saturation(&self) -> f32 {
        self.session.adjustments().saturation()
    }

    pub fn set_saturation(&mut self, value: f32) -> Result<(), JsValue> {
        self.session.set_saturation(value).map_err(to_js_error)
    }

    pub fn reset_adjustments(&mut self) -> Result<(), JsValue> {
        self.session.reset_adjustments().map_err(to_js_error)
    }

    // =========================================================================
    // Preview
    // =========================================================================

    /// Advance transitions by `elapsed_ms` and return the matrix to draw.
    ///
    /// Negative or NaN values count as no time; huge or infinite values
    /// finish the transition.
    pub fn tick(&mut self, elapsed_ms: f64) -> Vec<f64> {
        let elapsed =
            Duration::try_from_secs_f64(elapsed_ms.max(0.0) / 1000.0).unwrap_or(Duration::MAX);
        self.session.tick(elapsed);
        self.preview_matrix()
    }

    #[wasm_bindgen(getter)]
    pub fn is_animating(&self) -> bool {
        self.session.is_animating()
    }

    /// `[a, b, c, d, e, f]` as a Float64Array, CSS/Canvas matrix layout.
    pub fn preview_matrix(&self) -> Vec<f64> {
        self.session.preview_transform().as_array().to_vec()
    }

    /// CSS `transform` value for the preview element.
    pub fn preview_css(&self) -> String {
        self.session.preview_transform().to_css()
    }

    /// False while a commit runs; the host should disable its controls.
    #[wasm_bindgen(getter)]
    pub fn controls_enabled(&self) -> bool {
        self.session.controls_enabled()
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Apply the edit to the source and encode the result.
    ///
    /// # Errors
    /// Returns an error if the source cannot be decoded or processing fails.
    /// The session is left as it was so the user can retry.
    pub fn commit(&mut self) -> Result<JsCommitOutput, JsValue> {
        let output = block_on(self.pipeline.commit(&self.session)).map_err(to_js_error)?;
        let bytes = self
            .store
            .remove(&output.image)
            .ok_or_else(|| to_js_error(format!("committed image {} went missing", output.image)))?;
        Ok(JsCommitOutput::new(&output, bytes))
    }
}

impl JsEditSession {
    /// Build a session without going through `JsValue`.
    pub(crate) fn with_config(
        source: Vec<u8>,
        config: EditorConfig,
    ) -> Result<Self, retouch_core::SessionError> {
        let store = Arc::new(MemoryImageStore::new());
        let source_ref = store.insert(source.clone());
        let session = EditSession::new(source_ref, config)?;
        let pipeline = CommitPipeline::new(Arc::clone(&store));

        Ok(Self {
            session,
            store,
            pipeline,
            source,
        })
    }

    fn gesture(&mut self, event: GestureEvent) -> Result<(), JsValue> {
        self.session
            .apply_gesture(event)
            .map(drop)
            .map_err(to_js_error)
    }
}

fn parse_mode(mode: &str) -> Result<retouch_core::EditingMode, JsValue> {
    mode_from_str(mode).ok_or_else(|| to_js_error(format!("Unknown editing mode: {mode}")))
}

#[cfg(target_arch = "wasm32")]
fn warn_console(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

#[cfg(not(target_arch = "wasm32"))]
fn warn_console(_message: &str) {}
