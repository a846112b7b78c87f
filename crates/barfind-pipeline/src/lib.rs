//! barfind-pipeline: locate the dominant barcode region in an image (sans-IO).
//!
//! Stages, each producing a new image of the input's size:
//! grayscale -> directional gradient -> blur + threshold -> closing ->
//! erode/dilate cleanup -> largest external contour -> minimal-area
//! oriented rectangle -> annotation.
//!
//! This crate has **no I/O dependencies**: it takes in-memory images
//! and returns structured data. File loading, saving and logging setup
//! live in the `barfind` binary.

pub mod annotate;
pub mod color;
pub mod denoise;
pub mod diagnostics;
pub mod geometry;
pub mod gradient;
pub mod grayscale;
pub mod morphology;
pub mod pipeline;
pub mod region;
pub mod types;

pub use color::BorderColor;
pub use denoise::BlurMethod;
pub use diagnostics::{Clock, PipelineDiagnostics, detect_with_diagnostics};
pub use gradient::GradientOperator;
pub use pipeline::Pipeline;
pub use types::{
    BoundingBox, Detection, DetectionConfig, DetectionError, Dimensions, GrayImage, KernelSize,
    OrientedRectangle, PixelPoint, Point, Preset, RgbImage,
};

/// Find the barcode region in `image` and outline it.
///
/// Runs every stage with `config` and returns the annotated copy of the
/// image together with the box that was drawn. Nothing is retained
/// between calls.
///
/// # Errors
///
/// Checked in this order:
///
/// - [`DetectionError::InvalidImage`] if `image` has zero width or height.
/// - [`DetectionError::InvalidConfig`] if `config` fails
///   [`DetectionConfig::validate`].
/// - [`DetectionError::NoRegionFound`] if no foreground region survives
///   the cleanup stages.
pub fn detect_barcode(image: RgbImage, config: &DetectionConfig) -> Result<Detection, DetectionError> {
    Ok(Pipeline::new(image, config.clone())?
        .grayscale()
        .map_gradient()
        .suppress_noise()
        .close()
        .refine()
        .select_region()?
        .annotate()?
        .into_detection())
}

/// Locate the barcode region without drawing anything.
///
/// # Errors
///
/// Same as [`detect_barcode`], minus the annotation step.
pub fn locate_barcode(
    image: RgbImage,
    config: &DetectionConfig,
) -> Result<OrientedRectangle, DetectionError> {
    Ok(Pipeline::new(image, config.clone())?
        .grayscale()
        .map_gradient()
        .suppress_noise()
        .close()
        .refine()
        .select_region()?
        .rectangle())
}
