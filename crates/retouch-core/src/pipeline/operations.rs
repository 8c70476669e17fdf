//! Turning a session snapshot into an ordered list of export operations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adjustments::ColorChannel;
use crate::encode::OutputFormat;
use crate::preview::FrameSize;
use crate::store::ImageRef;
use crate::transform::{TransformState, Vec2};
use crate::AdjustmentState;

/// Everything a commit needs, copied out of the session at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSnapshot {
    pub session_id: Uuid,
    pub source: ImageRef,
    pub transform: TransformState,
    pub adjustments: AdjustmentState,
    /// Fitted preview frame, if the preview was laid out.
    pub frame: Option<FrameSize>,
}

/// A single step of the export chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum EditOperation {
    /// Rotate clockwise around the image center.
    Rotate { degrees: f64 },
    /// Keep the region visible through the frame under pan and zoom.
    ///
    /// `rotation_degrees` is the rotation already applied, needed to turn
    /// the frame the same way as the image.
    Crop {
        translation: Vec2,
        scale: f64,
        rotation_degrees: f64,
        frame: Option<FrameSize>,
    },
    /// One color channel.
    Adjust { channel: ColorChannel, value: f32 },
}

impl EditOperation {
    /// Rotation and crop move pixels without changing their values.
    pub fn is_geometric(&self) -> bool {
        matches!(self, EditOperation::Rotate { .. } | EditOperation::Crop { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            EditOperation::Rotate { .. } => "rotate",
            EditOperation::Crop { .. } => "crop",
            EditOperation::Adjust { channel, .. } => match channel {
                ColorChannel::Brightness => "brightness",
                ColorChannel::Contrast => "contrast",
                ColorChannel::Saturation => "saturation",
            },
        }
    }
}

/// Build the operation list from non-default fields only.
///
/// Order: rotate, crop, then brightness, contrast and saturation. An identity
/// transform with zeroed sliders yields an empty list.
pub fn build_operations(snapshot: &CommitSnapshot) -> Vec<EditOperation> {
    let transform = &snapshot.transform;
    let mut operations = Vec::with_capacity(5);

    if transform.has_rotation() {
        operations.push(EditOperation::Rotate {
            degrees: transform.rotation_degrees(),
        });
    }

    if transform.has_view_change() {
        operations.push(EditOperation::Crop {
            translation: transform.translation(),
            scale: transform.scale(),
            rotation_degrees: transform.rotation_degrees(),
            frame: snapshot.frame,
        });
    }

    operations.extend(
        snapshot
            .adjustments
            .non_default_channels()
            .map(|(channel, value)| EditOperation::Adjust { channel, value }),
    );

    operations
}

/// Output format policy.
///
/// - no operations: plain JPEG re-encode
/// - geometric operations only: PNG, nothing is lost beyond the source
/// - any color operation: JPEG
pub fn select_output_format(operations: &[EditOperation]) -> OutputFormat {
    if !operations.is_empty() && operations.iter().all(EditOperation::is_geometric) {
        OutputFormat::Png
    } else {
        OutputFormat::Jpeg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(transform: TransformState, adjustments: AdjustmentState) -> CommitSnapshot {
        CommitSnapshot {
            session_id: Uuid::nil(),
            source: ImageRef::from("memory://source"),
            transform,
            adjustments,
            frame: None,
        }
    }

    #[test]
    fn test_defaults_produce_no_operations() {
        let ops = build_operations(&snapshot(
            TransformState::identity(),
            AdjustmentState::new(),
        ));
        assert!(ops.is_empty());
        assert_eq!(select_output_format(&ops), OutputFormat::Jpeg);
    }

    #[test]
    fn test_full_order() {
        let mut adjustments = AdjustmentState::new();
        adjustments.set_saturation(-10.0);
        adjustments.set_contrast(5.0);
        adjustments.set_brightness(20.0);
        let transform = TransformState::new(Vec2::new(50.0, -30.0), 2.0, 90.0);

        let ops = build_operations(&snapshot(transform, adjustments));
        let names: Vec<_> = ops.iter().map(EditOperation::name).collect();
        assert_eq!(
            names,
            vec!["rotate", "crop", "brightness", "contrast", "saturation"]
        );
        assert_eq!(select_output_format(&ops), OutputFormat::Jpeg);
    }

    #[test]
    fn test_skips_default_axes() {
        let transform = TransformState::identity().with_rotation(180.0);
        let mut adjustments = AdjustmentState::new();
        adjustments.set_contrast(30.0);

        let ops = build_operations(&snapshot(transform, adjustments));
        assert_eq!(
            ops,
            vec![
                EditOperation::Rotate { degrees: 180.0 },
                EditOperation::Adjust {
                    channel: ColorChannel::Contrast,
                    value: 30.0
                },
            ]
        );
    }

    #[test]
    fn test_geometric_only_is_lossless() {
        let transform = TransformState::new(Vec2::new(10.0, 0.0), 1.5, 0.0);
        let ops = build_operations(&snapshot(transform, AdjustmentState::new()));

        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_geometric());
        assert_eq!(select_output_format(&ops), OutputFormat::Png);
    }

    #[test]
    fn test_crop_carries_frame() {
        let mut snap = snapshot(
            TransformState::identity().with_translation(Vec2::new(1.0, 2.0)),
            AdjustmentState::new(),
        );
        snap.frame = Some(FrameSize::new(300.0, 200.0));

        match build_operations(&snap)[0] {
            EditOperation::Crop { frame, scale, .. } => {
                assert_eq!(frame, Some(FrameSize::new(300.0, 200.0)));
                assert_eq!(scale, 1.0);
            }
            other => panic!("expected crop, got {other:?}"),
        }
    }
}
