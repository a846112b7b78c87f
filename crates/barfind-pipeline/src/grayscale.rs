//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP, TIFF) and produces the
//! color image the bounding box is drawn onto, plus the single-channel
//! luminance image the detection stages operate on.

use image::{GrayImage, RgbImage};

use crate::types::DetectionError;

/// Decode raw image bytes into an 8-bit RGB image.
///
/// # Errors
///
/// Returns [`DetectionError::InvalidImage`] if `bytes` is empty, the
/// format is unrecognized, or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, DetectionError> {
    if bytes.is_empty() {
        return Err(DetectionError::InvalidImage(
            "input image data is empty".to_string(),
        ));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| DetectionError::InvalidImage(format!("failed to decode image: {e}")))?;
    Ok(img.to_rgb8())
}

/// Convert a color image to luminance.
///
/// A gray image expanded to RGB (equal channels) comes back with its
/// original pixels, so converting twice changes nothing.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}
