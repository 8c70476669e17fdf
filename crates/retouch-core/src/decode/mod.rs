//! Image decoding for Retouch.
//!
//! This module provides functionality for:
//! - Decoding source images (JPEG, PNG) into RGB buffers
//! - Correcting EXIF orientation so pixels match what the user saw
//! - Probing dimensions cheaply for preview layout
//!
//! Decoding is lazy: nothing touches the source until the preview probes it
//! or a commit reads it.

mod source;
mod types;

pub use source::{decode_image, get_orientation, probe_dimensions};
pub use types::{DecodeError, DecodedImage, ImageDimensions, Orientation};
