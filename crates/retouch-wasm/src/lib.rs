//! Retouch WASM - WebAssembly bindings for Retouch
//!
//! This crate exposes the retouch-core editing engine to JavaScript/TypeScript
//! hosts. The host owns the screen and the gesture recognizers; the engine
//! owns the edit state and produces the committed image.
//!
//! # Module Structure
//!
//! - `session` - `JsEditSession`, one per editor invocation
//! - `types` - WASM-compatible result types (commit output, preview layout)
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsEditSession } from '@retouch/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! const session = new JsEditSession(bytes);
//! session.rotate_step();
//! session.set_brightness(20);
//! const output = session.commit();
//! console.log(`Committed ${output.width}x${output.height} ${output.mime_type}`);
//! ```

use std::fmt::Display;

use wasm_bindgen::prelude::*;

mod session;
mod types;

// Re-export public types
pub use session::JsEditSession;
pub use types::{JsCommitOutput, JsPreviewLayout};

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Convert an engine error into a JavaScript `Error`.
pub(crate) fn to_js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}
