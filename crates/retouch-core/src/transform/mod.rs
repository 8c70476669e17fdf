//! Geometric transform: the live state and its export operations.
//!
//! [`TransformState`] is what gestures mutate and what the preview renders.
//! At commit time it turns into export operations, applied in this order:
//! 1. Rotation (clockwise, around the image center)
//! 2. Crop to the region visible through the frame
//!
//! # Coordinate System
//!
//! - Translation is in frame units, positive x right, positive y down
//! - Rotation angles are in degrees, positive = clockwise
//! - Crop coordinates are normalized (0.0 to 1.0)

mod crop;
mod rotation;
mod state;

pub use crop::{apply_crop, CropRegion};
pub use rotation::{
    apply_rotation, compute_rotated_bounds, rotated_extent, InterpolationFilter, QuarterTurn,
};
pub use state::{normalize_degrees, TransformState, Vec2};
