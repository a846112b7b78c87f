//! Noise suppression: blur the gradient map, then binarize it.
//!
//! Blurring spreads the dense response of a bar pattern into a solid
//! bright patch while isolated edges fade, so a high fixed threshold
//! keeps mostly the barcode area.

use std::fmt;

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::types::KernelSize;

/// Smoothing method used before thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlurMethod {
    /// Unweighted mean over the kernel window.
    Box,
    /// Gaussian weights with sigma derived from the kernel extent.
    #[default]
    Gaussian,
}

impl fmt::Display for BlurMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Box => f.write_str("box"),
            Self::Gaussian => f.write_str("gaussian"),
        }
    }
}

/// Gaussian sigma for a kernel of `extent` taps.
///
/// Same rule OpenCV applies when asked for a sized kernel with sigma 0:
/// `0.3 * ((extent - 1) * 0.5 - 1) + 0.8`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_extent(extent: u32) -> f32 {
    let k = extent as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian of `extent` taps, sigma from [`sigma_for_extent`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_taps(extent: u32) -> Vec<f32> {
    let extent = extent.max(1);
    let sigma = sigma_for_extent(extent);
    let center = (extent - 1) as f32 / 2.0;
    let taps: Vec<f32> = (0..extent)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Smooth `image` with the given method and kernel.
///
/// Both methods honor the full `W x H` shape: the box filter averages a
/// `W x H` window, the Gaussian runs a `W`-tap row pass and an `H`-tap
/// column pass, each with its own sigma. Kernel sides are expected to be
/// odd (see [`DetectionConfig::validate`](crate::DetectionConfig::validate));
/// a 1x1 kernel returns the image unchanged.
#[must_use = "returns the blurred image"]
pub fn blur(image: &GrayImage, method: BlurMethod, kernel: KernelSize) -> GrayImage {
    if kernel.width <= 1 && kernel.height <= 1 {
        return image.clone();
    }
    match method {
        BlurMethod::Box => {
            imageproc::filter::box_filter(image, kernel.width / 2, kernel.height / 2)
        }
        BlurMethod::Gaussian => {
            // `separable_filter` wants equal-length kernels, so each
            // direction runs on its own.
            let rows =
                imageproc::filter::horizontal_filter(image, &gaussian_taps(kernel.width));
            imageproc::filter::vertical_filter(&rows, &gaussian_taps(kernel.height))
        }
    }
}

/// Binarize: pixels `>= threshold` become 255, all others 0.
#[must_use = "returns the binary mask"]
pub fn threshold(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] >= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Blur then binarize.
#[must_use = "returns the binary mask"]
pub fn suppress_noise(
    image: &GrayImage,
    method: BlurMethod,
    kernel: KernelSize,
    cutoff: u8,
) -> GrayImage {
    threshold(&blur(image, method, kernel), cutoff)
}
