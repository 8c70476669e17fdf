//! Pixel work for a commit: decode, apply operations, encode.

use tracing::debug;

use super::operations::EditOperation;
use super::CommitError;
use crate::adjustments::apply_adjustment;
use crate::decode::{decode_image, DecodedImage};
use crate::encode::{encode_image, OutputFormat};
use crate::preview::FrameSize;
use crate::transform::{
    apply_crop, apply_rotation, rotated_extent, CropRegion, InterpolationFilter,
};

/// The CPU-bound half of the commit pipeline.
///
/// Runs off the async executor, so every method is synchronous.
pub trait ImageProcessor: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CommitError>;

    fn apply(
        &self,
        image: DecodedImage,
        operation: &EditOperation,
    ) -> Result<DecodedImage, CommitError>;

    fn encode(
        &self,
        image: &DecodedImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CommitError>;
}

/// Default processor backed by the `image` crate codecs.
#[derive(Debug, Clone, Copy)]
pub struct NativeProcessor {
    filter: InterpolationFilter,
}

impl Default for NativeProcessor {
    fn default() -> Self {
        Self {
            filter: InterpolationFilter::Lanczos3,
        }
    }
}

impl NativeProcessor {
    pub fn new(filter: InterpolationFilter) -> Self {
        Self { filter }
    }
}

impl ImageProcessor for NativeProcessor {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CommitError> {
        Ok(decode_image(bytes)?)
    }

    fn apply(
        &self,
        mut image: DecodedImage,
        operation: &EditOperation,
    ) -> Result<DecodedImage, CommitError> {
        match *operation {
            EditOperation::Rotate { degrees } => Ok(apply_rotation(&image, degrees, self.filter)),
            EditOperation::Crop {
                translation,
                scale,
                rotation_degrees,
                frame,
            } => {
                let frame = crop_frame(&image, frame, rotation_degrees);
                let region = CropRegion::from_view(translation, scale, frame).ok_or_else(|| {
                    CommitError::Processing("visible region lies outside the image".to_string())
                })?;
                debug!(?region, "resolved crop");
                Ok(apply_crop(&image, &region))
            }
            EditOperation::Adjust { channel, value } => {
                apply_adjustment(&mut image.pixels, channel, value);
                Ok(image)
            }
        }
    }

    fn encode(
        &self,
        image: &DecodedImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CommitError> {
        Ok(encode_image(image, format, quality)?)
    }
}

/// Frame the crop is measured against, in the same orientation as `image`.
///
/// Without a laid-out preview, translation is in source pixels and the frame
/// is the image itself.
fn crop_frame(
    image: &DecodedImage,
    frame: Option<FrameSize>,
    rotation_degrees: f64,
) -> (f64, f64) {
    match frame.filter(FrameSize::is_valid) {
        Some(frame) => rotated_extent(frame.width, frame.height, rotation_degrees),
        None => (image.width as f64, image.height as f64),
    }
}

/// Run the whole chain for one commit.
///
/// Nothing is returned unless every step succeeds.
pub(crate) fn process<P>(
    processor: &P,
    source: &[u8],
    operations: &[EditOperation],
    format: OutputFormat,
    quality: u8,
) -> Result<(Vec<u8>, DecodedImage), CommitError>
where
    P: ImageProcessor + ?Sized,
{
    let mut image = processor.decode(source)?;
    for operation in operations {
        debug!(
            operation = operation.name(),
            width = image.width,
            height = image.height,
            "applying operation"
        );
        image = processor.apply(image, operation)?;
    }
    let bytes = processor.encode(&image, format, quality)?;
    Ok((bytes, image))
}
