//! WASM-compatible wrapper types for editor results.
//!
//! These types carry data out of the engine in a shape JavaScript can read
//! directly, converting core enums to plain strings and numbers.

use retouch_core::decode::ImageDimensions;
use retouch_core::pipeline::CommitOutput;
use retouch_core::preview::PreviewSurface;
use retouch_core::session::EditingMode;
use wasm_bindgen::prelude::*;

/// An encoded image produced by a commit.
///
/// # Memory Management
///
/// The encoded bytes live in WASM memory. `bytes()` copies them into a
/// `Uint8Array`, ready for a `Blob` or an upload.
#[wasm_bindgen]
pub struct JsCommitOutput {
    bytes: Vec<u8>,
    mime_type: String,
    width: u32,
    height: u32,
    operation_count: usize,
}

#[wasm_bindgen]
impl JsCommitOutput {
    /// Get the output width in pixels
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the output height in pixels
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// MIME type of the encoded bytes (`image/jpeg` or `image/png`)
    #[wasm_bindgen(getter)]
    pub fn mime_type(&self) -> String {
        self.mime_type.clone()
    }

    /// Number of operations applied before encoding; 0 means a plain re-encode
    #[wasm_bindgen(getter)]
    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the encoded image as Uint8Array (copied).
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

impl JsCommitOutput {
    pub(crate) fn new(output: &CommitOutput, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: output.format.mime_type().to_string(),
            width: output.width,
            height: output.height,
            operation_count: output.operations.len(),
        }
    }
}

/// Layout of the preview after probing the source.
///
/// When the source cannot be read `ready` is false, every size is 0 and
/// `reason` says why; the host should show an empty preview.
#[wasm_bindgen]
pub struct JsPreviewLayout {
    ready: bool,
    image_width: u32,
    image_height: u32,
    frame_width: f64,
    frame_height: f64,
    reason: Option<String>,
}

#[wasm_bindgen]
impl JsPreviewLayout {
    #[wasm_bindgen(getter)]
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Source width after EXIF orientation
    #[wasm_bindgen(getter)]
    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    /// Source height after EXIF orientation
    #[wasm_bindgen(getter)]
    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    /// Width of the fitted image box inside the viewport
    #[wasm_bindgen(getter)]
    pub fn frame_width(&self) -> f64 {
        self.frame_width
    }

    /// Height of the fitted image box inside the viewport
    #[wasm_bindgen(getter)]
    pub fn frame_height(&self) -> f64 {
        self.frame_height
    }

    #[wasm_bindgen(getter)]
    pub fn reason(&self) -> Option<String> {
        self.reason.clone()
    }
}

impl From<&PreviewSurface> for JsPreviewLayout {
    fn from(surface: &PreviewSurface) -> Self {
        match surface {
            PreviewSurface::Ready { dimensions, frame } => {
                let ImageDimensions { width, height } = *dimensions;
                Self {
                    ready: true,
                    image_width: width,
                    image_height: height,
                    frame_width: frame.width,
                    frame_height: frame.height,
                    reason: None,
                }
            }
            PreviewSurface::Blank { reason } => Self {
                ready: false,
                image_width: 0,
                image_height: 0,
                frame_width: 0.0,
                frame_height: 0.0,
                reason: Some(reason.clone()),
            },
        }
    }
}

/// Parse an editing mode name.
///
/// Values: `"none"`, `"crop"`, `"adjust"`. Anything else is rejected.
pub(crate) fn mode_from_str(value: &str) -> Option<EditingMode> {
    match value {
        "none" => Some(EditingMode::None),
        "crop" => Some(EditingMode::Crop),
        "adjust" => Some(EditingMode::Adjust),
        _ => None,
    }
}

pub(crate) fn mode_to_str(mode: EditingMode) -> &'static str {
    match mode {
        EditingMode::None => "none",
        EditingMode::Crop => "crop",
        EditingMode::Adjust => "adjust",
    }
}
