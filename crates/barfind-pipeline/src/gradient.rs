//! Directional gradient map.
//!
//! Barcodes are a run of sharp vertical bars: strong change along x,
//! little change along y. Subtracting the y-derivative from the
//! x-derivative and taking the absolute value highlights exactly that
//! kind of texture.
//!
//! Derivatives come from [`imageproc::gradients`] (3x3 Scharr or Sobel)
//! and are combined in `f32` before saturating back to 8 bits.

use std::fmt;

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// 3x3 derivative kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientOperator {
    /// Scharr weights (3, 10, 3): better rotational accuracy on fine edges.
    #[default]
    Scharr,
    /// Classic Sobel weights (1, 2, 1).
    Sobel,
}

impl fmt::Display for GradientOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scharr => f.write_str("scharr"),
            Self::Sobel => f.write_str("sobel"),
        }
    }
}

/// Per-pixel signed derivative responses.
type Response = ImageBuffer<Luma<i16>, Vec<i16>>;

impl GradientOperator {
    fn responses(self, image: &GrayImage) -> (Response, Response) {
        match self {
            Self::Scharr => (
                imageproc::gradients::horizontal_scharr(image),
                imageproc::gradients::vertical_scharr(image),
            ),
            Self::Sobel => (
                imageproc::gradients::horizontal_sobel(image),
                imageproc::gradients::vertical_sobel(image),
            ),
        }
    }
}

/// Compute `|d/dx - d/dy|` saturated to `0..=255`.
///
/// Output has the dimensions of `image`.
#[must_use = "returns the gradient map"]
pub fn gradient_map(image: &GrayImage, operator: GradientOperator) -> GrayImage {
    let (dx, dy) = operator.responses(image);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let gx = f32::from(dx.get_pixel(x, y).0[0]);
        let gy = f32::from(dy.get_pixel(x, y).0[0]);
        Luma([saturate(gx - gy)])
    })
}

/// Absolute value, rounded and clamped into a `u8`.
///
/// Halves round away from zero, where OpenCV's `convertScaleAbs` rounds
/// them to even. Differences of integer derivative responses are whole
/// numbers, so the two never disagree here.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn saturate(value: f32) -> u8 {
    value.abs().round().min(255.0) as u8
}
