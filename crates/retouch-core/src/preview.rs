//! Live preview mapping.
//!
//! The preview never touches source pixels. It turns a [`TransformState`]
//! into a 2D affine matrix the host applies to the displayed image, and it
//! probes the source once to lay out the frame the image is shown in.

use std::ops::Mul;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decode::{probe_dimensions, ImageDimensions};
use crate::store::{ImageRef, ImageStore};
use crate::transform::{TransformState, Vec2};

/// 2D affine matrix in CSS `matrix(a, b, c, d, e, f)` layout.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`, with y pointing down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2D {
    pub const IDENTITY: Affine2D = Affine2D {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(offset: Vec2) -> Self {
        Self {
            e: offset.x,
            f: offset.y,
            ..Self::IDENTITY
        }
    }

    pub fn scale(factor: f64) -> Self {
        Self {
            a: factor,
            d: factor,
            ..Self::IDENTITY
        }
    }

    /// Clockwise rotation on screen.
    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self * other`: applies `other` first.
    pub fn then_after(&self, other: &Affine2D) -> Affine2D {
        Affine2D {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            self.a * point.x + self.c * point.y + self.e,
            self.b * point.x + self.d * point.y + self.f,
        )
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// CSS `transform` value.
    pub fn to_css(&self) -> String {
        format!(
            "matrix({}, {}, {}, {}, {}, {})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

impl Mul for Affine2D {
    type Output = Affine2D;

    fn mul(self, rhs: Affine2D) -> Affine2D {
        self.then_after(&rhs)
    }
}

/// Preview matrix for a transform: translate, then scale, then rotate.
///
/// Composed the way CSS composes `translate(..) scale(..) rotate(..)`, so the
/// rotation acts on the image first and the translation is never scaled.
pub fn preview_transform(state: &TransformState) -> Affine2D {
    Affine2D::translate(state.translation())
        * Affine2D::scale(state.scale())
        * Affine2D::rotate(state.rotation_degrees())
}

/// Size of a rectangle in host layout units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

impl FrameSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

impl From<ImageDimensions> for FrameSize {
    fn from(dims: ImageDimensions) -> Self {
        Self::new(dims.width as f64, dims.height as f64)
    }
}

/// Largest frame with the image's aspect ratio that fits inside `viewport`.
pub fn fit_contain(image: ImageDimensions, viewport: FrameSize) -> FrameSize {
    let (w, h) = (image.width as f64, image.height as f64);
    if w <= 0.0 || h <= 0.0 || !viewport.is_valid() {
        return FrameSize::new(0.0, 0.0);
    }
    let ratio = (viewport.width / w).min(viewport.height / h);
    FrameSize::new(w * ratio, h * ratio)
}

/// The preview area after probing the source.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewSurface {
    /// Source probed; `frame` is the fitted image box in the viewport.
    Ready {
        dimensions: ImageDimensions,
        frame: FrameSize,
    },
    /// Source could not be read or decoded. The host shows an empty preview.
    Blank { reason: String },
}

impl PreviewSurface {
    /// Probe `source` through `store` and fit it into `viewport`.
    ///
    /// Never fails: a broken source yields [`PreviewSurface::Blank`].
    pub async fn init<S>(store: &S, source: &ImageRef, viewport: FrameSize) -> PreviewSurface
    where
        S: ImageStore + ?Sized,
    {
        match store.read(source).await {
            Ok(bytes) => Self::from_bytes(&bytes, viewport),
            Err(e) => {
                warn!(source = %source, error = %e, "preview source unavailable");
                PreviewSurface::Blank {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Probe already loaded source bytes.
    pub fn from_bytes(bytes: &[u8], viewport: FrameSize) -> PreviewSurface {
        match probe_dimensions(bytes) {
            Ok(dimensions) => {
                let frame = fit_contain(dimensions, viewport);
                debug!(
                    width = dimensions.width,
                    height = dimensions.height,
                    frame_width = frame.width,
                    frame_height = frame.height,
                    "preview ready"
                );
                PreviewSurface::Ready { dimensions, frame }
            }
            Err(e) => {
                warn!(error = %e, "preview probe failed");
                PreviewSurface::Blank {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn frame(&self) -> Option<FrameSize> {
        match self {
            PreviewSurface::Ready { frame, .. } => Some(*frame),
            PreviewSurface::Blank { .. } => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, PreviewSurface::Blank { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_jpeg;
    use crate::store::MemoryImageStore;

    const EPS: f64 = 1e-9;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{a} != {b}");
    }

    #[test]
    fn test_identity_state_gives_identity_matrix() {
        assert_eq!(
            preview_transform(&TransformState::identity()),
            Affine2D::IDENTITY
        );
        assert_eq!(Affine2D::IDENTITY.to_css(), "matrix(1, 0, 0, 1, 0, 0)");
    }

    #[test]
    fn test_matrix_components() {
        let state = TransformState::new(Vec2::new(50.0, -30.0), 2.0, 90.0);
        let m = preview_transform(&state);

        assert_close(m.a, 0.0);
        assert_close(m.b, 2.0);
        assert_close(m.c, -2.0);
        assert_close(m.d, 0.0);
        assert_close(m.e, 50.0);
        assert_close(m.f, -30.0);
    }

    #[test]
    fn test_translation_is_not_scaled() {
        let state = TransformState::new(Vec2::new(10.0, 20.0), 3.0, 0.0);
        let origin = preview_transform(&state).apply_point(Vec2::ZERO);
        assert_close(origin.x, 10.0);
        assert_close(origin.y, 20.0);
    }

    #[test]
    fn test_rotation_is_clockwise_on_screen() {
        // +x axis turns toward +y (down) for a positive angle
        let p = Affine2D::rotate(90.0).apply_point(Vec2::new(1.0, 0.0));
        assert_close(p.x, 0.0);
        assert_close(p.y, 1.0);
    }

    #[test]
    fn test_composition_order() {
        let t = Affine2D::translate(Vec2::new(5.0, 0.0));
        let s = Affine2D::scale(2.0);
        let p = (t * s).apply_point(Vec2::new(1.0, 1.0));
        assert_close(p.x, 7.0);
        assert_close(p.y, 2.0);

        let q = (s * t).apply_point(Vec2::new(1.0, 1.0));
        assert_close(q.x, 12.0);
        assert_close(q.y, 2.0);
    }

    #[test]
    fn test_fit_contain() {
        let frame = fit_contain(ImageDimensions::new(2000, 1000), FrameSize::new(400.0, 400.0));
        assert_close(frame.width, 400.0);
        assert_close(frame.height, 200.0);

        let frame = fit_contain(ImageDimensions::new(500, 1000), FrameSize::new(400.0, 300.0));
        assert_close(frame.width, 150.0);
        assert_close(frame.height, 300.0);

        let frame = fit_contain(ImageDimensions::new(10, 10), FrameSize::new(0.0, 300.0));
        assert!(!frame.is_valid());
    }

    #[tokio::test]
    async fn test_init_ready() {
        let store = MemoryImageStore::new();
        let jpeg = encode_jpeg(&vec![90u8; 64 * 32 * 3], 64, 32, 80).unwrap();
        let source = store.insert(jpeg);

        let surface = PreviewSurface::init(&store, &source, FrameSize::new(320.0, 320.0)).await;
        match surface {
            PreviewSurface::Ready { dimensions, frame } => {
                assert_eq!(dimensions, ImageDimensions::new(64, 32));
                assert_close(frame.width, 320.0);
                assert_close(frame.height, 160.0);
            }
            PreviewSurface::Blank { reason } => panic!("unexpected blank: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_init_blank_on_bad_source() {
        let store = MemoryImageStore::new();
        let missing = ImageRef::from("memory://missing");
        let surface = PreviewSurface::init(&store, &missing, FrameSize::new(100.0, 100.0)).await;
        assert!(surface.is_blank());
        assert_eq!(surface.frame(), None);

        let garbage = store.insert(vec![0, 1, 2, 3]);
        let surface = PreviewSurface::init(&store, &garbage, FrameSize::new(100.0, 100.0)).await;
        assert!(matches!(surface, PreviewSurface::Blank { .. }));
    }
}
