//! Binary morphology with rectangular structuring elements.
//!
//! Built on `imageproc::morphology`. A rectangle is separable, so every
//! operation runs a `W x 1` row mask and then a `1 x H` column mask; the
//! result equals the full `W x H` mask at `W + H` instead of `W * H`
//! comparisons per pixel.
//!
//! Pixels outside the image never take part: erosion does not eat in
//! from the border and dilation does not grow in from it.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

use crate::types::KernelSize;

/// A solid rectangle anchored at `(width / 2, height / 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    width: u32,
    height: u32,
}

impl StructuringElement {
    /// Longest side an `imageproc` mask accepts.
    pub const MAX_SIDE: u32 = 511;

    /// The 3x3 square used by the cleanup stage.
    pub const SQUARE_3X3: Self = Self::rect(KernelSize::square(3));

    /// A solid rectangle of the given size.
    ///
    /// Sides are clamped to `1..=MAX_SIDE`.
    #[must_use]
    pub const fn rect(size: KernelSize) -> Self {
        Self {
            width: clamp_side(size.width),
            height: clamp_side(size.height),
        }
    }

    /// Horizontal extent.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Vertical extent.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.height
    }

    fn row_mask(self) -> Mask {
        let row = GrayImage::from_pixel(self.width, 1, Luma([255]));
        Mask::from_image(&row, anchor(self.width), 0)
    }

    fn column_mask(self) -> Mask {
        let column = GrayImage::from_pixel(1, self.height, Luma([255]));
        Mask::from_image(&column, 0, anchor(self.height))
    }
}

const fn clamp_side(side: u32) -> u32 {
    if side == 0 {
        1
    } else if side > StructuringElement::MAX_SIDE {
        StructuringElement::MAX_SIDE
    } else {
        side
    }
}

/// Centre offset of a side; at most 255 for sides up to `MAX_SIDE`.
fn anchor(side: u32) -> u8 {
    u8::try_from(side / 2).unwrap_or(u8::MAX)
}

/// Grow bright regions: each pixel becomes the maximum under the element.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &GrayImage, element: StructuringElement) -> GrayImage {
    let rows = grayscale_dilate(image, &element.row_mask());
    grayscale_dilate(&rows, &element.column_mask())
}

/// Shrink bright regions: each pixel becomes the minimum under the element.
#[must_use = "returns the eroded image"]
pub fn erode(image: &GrayImage, element: StructuringElement) -> GrayImage {
    let rows = grayscale_erode(image, &element.row_mask());
    grayscale_erode(&rows, &element.column_mask())
}

/// Morphological closing: dilation followed by erosion.
///
/// Bridges gaps narrower than the element so neighbouring bars merge
/// into one blob.
#[must_use = "returns the closed image"]
pub fn close(image: &GrayImage, element: StructuringElement) -> GrayImage {
    erode(&dilate(image, element), element)
}

/// Square elements whose radii add up to `iterations`, none wider than
/// [`StructuringElement::MAX_SIDE`].
fn refine_elements(iterations: u32) -> Vec<StructuringElement> {
    const MAX_RADIUS: u32 = StructuringElement::MAX_SIDE / 2;
    let full = iterations / MAX_RADIUS;
    let rest = iterations % MAX_RADIUS;
    (0..full)
        .map(|_| MAX_RADIUS)
        .chain((rest > 0).then_some(rest))
        .map(|radius| StructuringElement::rect(KernelSize::square(2 * radius + 1)))
        .collect()
}

/// Strip small blobs: `iterations` 3x3 erosions, then as many dilations.
///
/// Repeated 3x3 passes equal a single pass with a `(2n + 1)` square, so
/// each direction runs once with that element (split into several
/// squares when it would exceed the mask limit).
#[must_use = "returns the refined image"]
pub fn refine(image: &GrayImage, iterations: u32) -> GrayImage {
    let elements = refine_elements(iterations);
    let eroded = elements
        .iter()
        .fold(image.clone(), |img, &element| erode(&img, element));
    elements
        .iter()
        .fold(eroded, |img, &element| dilate(&img, element))
}

/// Count pixels that are set (non-zero).
#[must_use]
pub fn foreground_pixels(image: &GrayImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}
