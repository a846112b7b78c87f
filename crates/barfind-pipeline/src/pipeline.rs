//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect_barcode`] which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use barfind_pipeline::{DetectionConfig, DetectionError, Pipeline, RgbImage};
//! # fn run(image: RgbImage) -> Result<(), DetectionError> {
//! let refined = Pipeline::new(image, DetectionConfig::default())?
//!     .grayscale()
//!     .map_gradient()
//!     .suppress_noise()
//!     .close()
//!     .refine();
//! println!("{} foreground pixels", refined.foreground_pixels());
//!
//! let detection = refined.select_region()?.annotate()?.into_detection();
//! assert_eq!(detection.annotated.width(), detection.dimensions.width);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages). Only the original color image is
//! carried forward; every other intermediate is dropped as soon as the
//! following stage has been computed from it.

use crate::diagnostics::StageMetrics;
use crate::morphology::StructuringElement;
use crate::region::{Region, Selection};
use crate::types::{
    BoundingBox, Detection, DetectionConfig, DetectionError, Dimensions, GrayImage,
    OrientedRectangle, RgbImage,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Validated input, before any processing.
///
/// Call [`grayscale`](Self::grayscale) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .grayscale() to continue"]
#[derive(Debug)]
pub struct Pending {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
}

impl Pending {
    /// The input color image.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// The configuration this run uses.
    #[must_use]
    pub const fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Convert to luminance and advance to [`Grayscaled`].
    pub fn grayscale(self) -> Grayscaled {
        let gray = crate::grayscale::to_grayscale(&self.original);
        tracing::debug!(
            width = self.dimensions.width,
            height = self.dimensions.height,
            "converted to grayscale"
        );
        Grayscaled {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            gray,
        }
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Single-channel luminance image.
///
/// Call [`map_gradient`](Self::map_gradient) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .map_gradient() to continue"]
#[derive(Debug)]
pub struct Grayscaled {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
    gray: GrayImage,
}

impl Grayscaled {
    /// The grayscale image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Compute the directional gradient map and advance.
    pub fn map_gradient(self) -> GradientMapped {
        let operator = self.config.gradient_operator;
        let gradient = crate::gradient::gradient_map(&self.gray, operator);
        tracing::debug!(%operator, "gradient map computed");
        GradientMapped {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            gradient,
        }
    }
}

// ───────────────────────── Stage 2: GradientMapped ───────────────────

/// `|dx - dy|` response, saturated to 8 bits.
///
/// Call [`suppress_noise`](Self::suppress_noise) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .suppress_noise() to continue"]
#[derive(Debug)]
pub struct GradientMapped {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
    gradient: GrayImage,
}

impl GradientMapped {
    /// The gradient map.
    #[must_use]
    pub const fn gradient(&self) -> &GrayImage {
        &self.gradient
    }

    /// Blur and threshold the gradient map into a binary mask.
    pub fn suppress_noise(self) -> Denoised {
        let mask = crate::denoise::suppress_noise(
            &self.gradient,
            self.config.blur_method,
            self.config.blur_kernel_size,
            self.config.threshold,
        );
        tracing::debug!(
            method = %self.config.blur_method,
            kernel = %self.config.blur_kernel_size,
            threshold = self.config.threshold,
            "gradient map binarized"
        );
        Denoised {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            mask,
        }
    }
}

// ───────────────────────── Stage 3: Denoised ─────────────────────────

/// Binary mask after blur and threshold.
///
/// Call [`close`](Self::close) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .close() to continue"]
#[derive(Debug)]
pub struct Denoised {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
    mask: GrayImage,
}

impl Denoised {
    /// The thresholded mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Set pixels in the mask.
    #[must_use]
    pub fn foreground_pixels(&self) -> u64 {
        crate::morphology::foreground_pixels(&self.mask)
    }

    /// Morphological closing with the configured rectangle.
    pub fn close(self) -> Closed {
        let element = StructuringElement::rect(self.config.closing_kernel_size);
        let closed = crate::morphology::close(&self.mask, element);
        tracing::debug!(kernel = %self.config.closing_kernel_size, "mask closed");
        Closed {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            closed,
        }
    }
}

// ───────────────────────── Stage 4: Closed ───────────────────────────

/// Mask with bar gaps bridged.
///
/// Call [`refine`](Self::refine) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .refine() to continue"]
#[derive(Debug)]
pub struct Closed {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
    closed: GrayImage,
}

impl Closed {
    /// The closed mask.
    #[must_use]
    pub const fn closed(&self) -> &GrayImage {
        &self.closed
    }

    /// Set pixels in the mask.
    #[must_use]
    pub fn foreground_pixels(&self) -> u64 {
        crate::morphology::foreground_pixels(&self.closed)
    }

    /// Strip small blobs with repeated 3x3 erosion then dilation.
    pub fn refine(self) -> Refined {
        let iterations = self.config.erode_dilate_iterations;
        let refined = crate::morphology::refine(&self.closed, iterations);
        tracing::debug!(iterations, "mask refined");
        Refined {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            refined,
        }
    }
}

// ───────────────────────── Stage 5: Refined ──────────────────────────

/// Mask after small-blob removal.
///
/// Call [`select_region`](Self::select_region) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .select_region() to continue"]
#[derive(Debug)]
pub struct Refined {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
    refined: GrayImage,
}

impl Refined {
    /// The refined mask.
    #[must_use]
    pub const fn refined(&self) -> &GrayImage {
        &self.refined
    }

    /// Set pixels in the mask.
    #[must_use]
    pub fn foreground_pixels(&self) -> u64 {
        crate::morphology::foreground_pixels(&self.refined)
    }

    /// Trace external contours, keep the largest and fit the minimal
    /// oriented rectangle around it.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::NoRegionFound`] if the mask is empty.
    pub fn select_region(self) -> Result<RegionSelected, DetectionError> {
        let mut regions = crate::region::external_regions(&self.refined);
        let selection = crate::region::largest(&regions)?;
        let region = regions.swap_remove(selection.index);
        let rectangle = region.min_area_rect().ok_or(DetectionError::NoRegionFound)?;
        let bounding_box = rectangle.bounding_box();
        tracing::info!(
            contours = selection.contour_count,
            area = selection.area,
            angle = rectangle.angle,
            "barcode region selected"
        );
        Ok(RegionSelected {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            region,
            selection,
            rectangle,
            bounding_box,
        })
    }
}

// ───────────────────────── Stage 6: RegionSelected ───────────────────

/// The winning region and its rectangle.
///
/// Call [`annotate`](Self::annotate) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .annotate() to continue"]
#[derive(Debug)]
pub struct RegionSelected {
    config: DetectionConfig,
    original: RgbImage,
    dimensions: Dimensions,
    region: Region,
    selection: Selection,
    rectangle: OrientedRectangle,
    bounding_box: BoundingBox,
}

impl RegionSelected {
    /// Outer border of the selected region.
    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    /// Contour count, winner index and area.
    #[must_use]
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    /// Minimal-area rectangle around the region.
    #[must_use]
    pub const fn rectangle(&self) -> OrientedRectangle {
        self.rectangle
    }

    /// Integer corners of [`rectangle`](Self::rectangle).
    #[must_use]
    pub const fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Draw the bounding box onto the original image.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidImage`] if no drawing surface of
    /// the image's size can be allocated.
    pub fn annotate(self) -> Result<Annotated, DetectionError> {
        let annotated = crate::annotate::draw_bounding_box(
            &self.original,
            &self.bounding_box,
            self.config.border_color,
            self.config.stroke_width,
        )?;
        tracing::debug!(
            color = %self.config.border_color,
            stroke_width = self.config.stroke_width,
            "bounding box drawn"
        );
        Ok(Annotated {
            config: self.config,
            detection: Detection {
                annotated,
                bounding_box: self.bounding_box,
                rectangle: self.rectangle,
                contour_count: self.selection.contour_count,
                region_area: self.selection.area,
                dimensions: self.dimensions,
            },
        })
    }
}

// ───────────────────────── Stage 7: Annotated ────────────────────────

/// Final state: the annotated image and the detection result.
///
/// Call [`into_detection`](Self::into_detection) to take the result.
#[must_use = "call .into_detection() to take the result"]
#[derive(Debug)]
pub struct Annotated {
    config: DetectionConfig,
    detection: Detection,
}

impl Annotated {
    /// The original image with the box drawn on it.
    #[must_use]
    pub const fn annotated(&self) -> &RgbImage {
        &self.detection.annotated
    }

    /// The detection result so far.
    #[must_use]
    pub const fn detection(&self) -> &Detection {
        &self.detection
    }

    /// Consume the pipeline and return the detection.
    #[must_use]
    pub fn into_detection(self) -> Detection {
        self.detection
    }
}

// ───────────────────────── Stage metrics ─────────────────────────────

/// Common interface over the processed stages, used by diagnostics.
///
/// [`Pending`] has done no work yet and does not implement it.
pub trait PipelineStage {
    /// Human-readable stage name.
    const NAME: &str;

    /// Position in the pipeline, starting at 1 for [`Grayscaled`].
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

impl PipelineStage for Grayscaled {
    const NAME: &str = "grayscale";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }
}

impl PipelineStage for GradientMapped {
    const NAME: &str = "gradient";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Gradient {
            operator: self.config.gradient_operator.to_string(),
            max_response: self.gradient.pixels().map(|p| p.0[0]).max().unwrap_or(0),
        }
    }
}

impl PipelineStage for Denoised {
    const NAME: &str = "denoise";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Denoise {
            method: self.config.blur_method.to_string(),
            kernel: self.config.blur_kernel_size.to_string(),
            threshold: self.config.threshold,
            foreground_pixels: self.foreground_pixels(),
            total_pixels: self.dimensions.pixel_count(),
        }
    }
}

impl PipelineStage for Closed {
    const NAME: &str = "close";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Close {
            kernel: self.config.closing_kernel_size.to_string(),
            foreground_pixels: self.foreground_pixels(),
        }
    }
}

impl PipelineStage for Refined {
    const NAME: &str = "refine";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Refine {
            iterations: self.config.erode_dilate_iterations,
            foreground_pixels: self.foreground_pixels(),
        }
    }
}

impl PipelineStage for RegionSelected {
    const NAME: &str = "select";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::RegionSelection {
            contour_count: self.selection.contour_count,
            region_area: self.selection.area,
            rect_width: self.rectangle.width,
            rect_height: self.rectangle.height,
            rect_angle: self.rectangle.angle,
        }
    }
}

impl PipelineStage for Annotated {
    const NAME: &str = "annotate";
    const INDEX: usize = 7;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Annotate {
            color: self.config.border_color.to_string(),
            stroke_width: self.config.stroke_width,
        }
    }
}

// ───────────────────────── Entry point ───────────────────────────────

/// Entry point for stage-by-stage execution.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Validate the input and create the first stage.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidImage`] if the image has zero
    /// width or height. This is checked before the configuration, so an
    /// empty image is reported as such even alongside a bad config.
    /// Otherwise returns [`DetectionError::InvalidConfig`] if
    /// [`DetectionConfig::validate`] fails.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: RgbImage, config: DetectionConfig) -> Result<Pending, DetectionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidImage(format!(
                "image must have non-zero dimensions, got {width}x{height}"
            )));
        }
        config.validate()?;
        Ok(Pending {
            config,
            original: image,
            dimensions: Dimensions { width, height },
        })
    }
}
