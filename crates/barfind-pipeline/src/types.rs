//! Shared types for the barfind detection pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::BorderColor;
use crate::denoise::BlurMethod;
use crate::gradient::GradientOperator;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// input and annotated images without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point on the integer pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl PixelPoint {
    /// Create a new pixel point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Extent of a rectangular kernel or structuring element in pixels.
///
/// Parses from `"WxH"` (e.g. `"21x7"`) or a single `"N"` meaning `N x N`,
/// and displays as `"WxH"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSize {
    /// Horizontal extent.
    pub width: u32,
    /// Vertical extent.
    pub height: u32,
}

impl KernelSize {
    /// Create a kernel size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a square kernel size.
    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// Returns the scaled kernel size, each side multiplied by `factor`.
    #[must_use]
    pub const fn scaled(self, factor: u32) -> Self {
        Self::new(
            self.width.saturating_mul(factor),
            self.height.saturating_mul(factor),
        )
    }
}

impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for KernelSize {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_side = |side: &str| {
            side.trim().parse::<u32>().map_err(|e| {
                DetectionError::InvalidConfig(format!("invalid kernel extent '{side}': {e}"))
            })
        };
        match s.split_once(['x', 'X']) {
            Some((w, h)) => Ok(Self::new(parse_side(w)?, parse_side(h)?)),
            None => Ok(Self::square(parse_side(s)?)),
        }
    }
}

/// A minimal-area rectangle at arbitrary rotation.
///
/// `width` is measured along the direction given by `angle` (degrees
/// from the +x axis, y pointing down), `height` perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedRectangle {
    /// Rectangle center.
    pub center: Point,
    /// Extent along the rotated x axis.
    pub width: f64,
    /// Extent along the rotated y axis.
    pub height: f64,
    /// Rotation in degrees.
    pub angle: f64,
}

impl OrientedRectangle {
    /// Rectangle area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// The four corners in drawing order.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let corner = |su: f64, sv: f64| {
            Point::new(
                (su * hw).mul_add(cos, -(sv * hh) * sin) + self.center.x,
                (su * hw).mul_add(sin, sv * hh * cos) + self.center.y,
            )
        };
        [
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ]
    }

    /// Integer corners, truncated toward zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox(
            self.corners()
                .map(|p| PixelPoint::new(p.x.trunc() as i32, p.y.trunc() as i32)),
        )
    }
}

/// Four integer corner points of an [`OrientedRectangle`], in drawing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox(pub [PixelPoint; 4]);

impl BoundingBox {
    /// The corner points.
    #[must_use]
    pub const fn corners(&self) -> &[PixelPoint; 4] {
        &self.0
    }

    /// Area of the quadrilateral spanned by the corners (shoelace).
    #[must_use]
    pub fn area(&self) -> f64 {
        let pts = &self.0;
        let twice: i64 = (0..4)
            .map(|i| {
                let (a, b) = (pts[i], pts[(i + 1) % 4]);
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let area = twice.unsigned_abs() as f64 / 2.0;
        area
    }
}

/// Named parameter sets for the two historical tunings of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preset {
    /// Gaussian blur, threshold 237, square 29x29 closing element.
    #[default]
    Gaussian,
    /// Box blur, threshold 225, wide 21x7 closing element.
    Box,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gaussian => f.write_str("gaussian"),
            Self::Box => f.write_str("box"),
        }
    }
}

/// Configuration for one detection run.
///
/// The value is passed explicitly to every invocation; nothing is
/// retained between calls. [`Default`] equals [`Preset::Gaussian`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Color of the drawn bounding box.
    pub border_color: BorderColor,

    /// Derivative kernel used by the gradient stage.
    pub gradient_operator: GradientOperator,

    /// Smoothing method applied before thresholding.
    pub blur_method: BlurMethod,

    /// Smoothing kernel extent. Both sides must be odd.
    pub blur_kernel_size: KernelSize,

    /// Binarization cutoff: blurred pixels at or above become foreground.
    pub threshold: u8,

    /// Structuring element used for the closing stage.
    pub closing_kernel_size: KernelSize,

    /// Number of 3x3 erosions (then the same number of dilations) used
    /// to strip small blobs.
    pub erode_dilate_iterations: u32,

    /// Stroke width of the drawn bounding box in pixels.
    pub stroke_width: f32,
}

impl DetectionConfig {
    /// Default border color (green).
    pub const DEFAULT_BORDER_COLOR: BorderColor = BorderColor::new(0, 255, 0);
    /// Default blur kernel extent.
    pub const DEFAULT_BLUR_KERNEL_SIZE: KernelSize = KernelSize::square(9);
    /// Default number of cleanup iterations.
    pub const DEFAULT_ERODE_DILATE_ITERATIONS: u32 = 4;
    /// Default stroke width in pixels.
    pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

    /// Build the configuration for a named preset.
    #[must_use]
    pub const fn preset(preset: Preset) -> Self {
        let (blur_method, threshold, closing_kernel_size) = match preset {
            Preset::Gaussian => (BlurMethod::Gaussian, 237, KernelSize::square(29)),
            Preset::Box => (BlurMethod::Box, 225, KernelSize::new(21, 7)),
        };
        Self {
            border_color: Self::DEFAULT_BORDER_COLOR,
            gradient_operator: GradientOperator::Scharr,
            blur_method,
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            threshold,
            closing_kernel_size,
            erode_dilate_iterations: Self::DEFAULT_ERODE_DILATE_ITERATIONS,
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
        }
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), DetectionError> {
        let blur = self.blur_kernel_size;
        if blur.width == 0 || blur.height == 0 {
            return Err(DetectionError::InvalidConfig(format!(
                "blur_kernel_size must be at least 1x1, got {blur}"
            )));
        }
        if blur.width % 2 == 0 || blur.height % 2 == 0 {
            return Err(DetectionError::InvalidConfig(format!(
                "blur_kernel_size sides must be odd, got {blur}"
            )));
        }
        let closing = self.closing_kernel_size;
        if closing.width == 0 || closing.height == 0 {
            return Err(DetectionError::InvalidConfig(format!(
                "closing_kernel_size must be at least 1x1, got {closing}"
            )));
        }
        let max_side = crate::morphology::StructuringElement::MAX_SIDE;
        if closing.width > max_side || closing.height > max_side {
            return Err(DetectionError::InvalidConfig(format!(
                "closing_kernel_size sides must be at most {max_side}, got {closing}"
            )));
        }
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            return Err(DetectionError::InvalidConfig(format!(
                "stroke_width must be a positive number, got {}",
                self.stroke_width
            )));
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

/// Successful outcome of [`detect_barcode`](crate::detect_barcode).
#[derive(Debug, Clone)]
pub struct Detection {
    /// The input image with the bounding box drawn on it.
    pub annotated: RgbImage,
    /// Integer corners of the selected region.
    pub bounding_box: BoundingBox,
    /// The minimal-area rectangle before rounding to pixels.
    pub rectangle: OrientedRectangle,
    /// Number of external contours found in the refined mask.
    pub contour_count: usize,
    /// Enclosed area of the selected contour in square pixels.
    pub region_area: f64,
    /// Source image dimensions.
    pub dimensions: Dimensions,
}

/// Errors that can occur during detection.
///
/// Uses custom `Serialize`/`Deserialize` so that a failure can be
/// reported as JSON alongside diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectionError {
    /// A configuration value is out of range or unparsable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input image is empty or malformed.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// No connected region survived the cleanup stages.
    #[error("no barcode-like region found in the image")]
    NoRegionFound,
}

/// Serde-compatible proxy for `DetectionError`.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
enum DetectionErrorProxy {
    InvalidConfig(String),
    InvalidImage(String),
    NoRegionFound,
}

impl Serialize for DetectionError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidConfig(s) => DetectionErrorProxy::InvalidConfig(s.clone()),
            Self::InvalidImage(s) => DetectionErrorProxy::InvalidImage(s.clone()),
            Self::NoRegionFound => DetectionErrorProxy::NoRegionFound,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DetectionError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match DetectionErrorProxy::deserialize(deserializer)? {
            DetectionErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            DetectionErrorProxy::InvalidImage(s) => Self::InvalidImage(s),
            DetectionErrorProxy::NoRegionFound => Self::NoRegionFound,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- KernelSize tests ---

    #[test]
    fn kernel_size_parses_width_by_height() {
        assert_eq!("21x7".parse::<KernelSize>().unwrap(), KernelSize::new(21, 7));
        assert_eq!("9X9".parse::<KernelSize>().unwrap(), KernelSize::square(9));
    }

    #[test]
    fn kernel_size_parses_single_side_as_square() {
        assert_eq!("29".parse::<KernelSize>().unwrap(), KernelSize::square(29));
    }

    #[test]
    fn kernel_size_rejects_garbage() {
        assert!(matches!(
            "ax7".parse::<KernelSize>(),
            Err(DetectionError::InvalidConfig(_))
        ));
        assert!(matches!(
            "-3".parse::<KernelSize>(),
            Err(DetectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn kernel_size_display() {
        assert_eq!(KernelSize::new(21, 7).to_string(), "21x7");
    }

    // --- OrientedRectangle tests ---

    #[test]
    fn axis_aligned_rectangle_corners() {
        let rect = OrientedRectangle {
            center: Point::new(10.0, 20.0),
            width: 8.0,
            height: 4.0,
            angle: 0.0,
        };
        let corners = rect.corners();
        assert!((corners[0].x - 6.0).abs() < 1e-9);
        assert!((corners[0].y - 18.0).abs() < 1e-9);
        assert!((corners[2].x - 14.0).abs() < 1e-9);
        assert!((corners[2].y - 22.0).abs() < 1e-9);
        assert!((rect.area() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn rotated_rectangle_keeps_side_lengths() {
        let rect = OrientedRectangle {
            center: Point::new(0.0, 0.0),
            width: 10.0,
            height: 2.0,
            angle: 30.0,
        };
        let c = rect.corners();
        let side = |a: Point, b: Point| (a.x - b.x).hypot(a.y - b.y);
        assert!((side(c[0], c[1]) - 10.0).abs() < 1e-9);
        assert!((side(c[1], c[2]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn bounding_box_truncates_toward_zero() {
        let rect = OrientedRectangle {
            center: Point::new(5.5, 5.5),
            width: 3.0,
            height: 3.0,
            angle: 0.0,
        };
        let bbox = rect.bounding_box();
        assert_eq!(bbox.corners()[0], PixelPoint::new(4, 4));
        assert_eq!(bbox.corners()[2], PixelPoint::new(7, 7));
        assert!((bbox.area() - 9.0).abs() < 1e-9);
    }

    // --- DetectionConfig tests ---

    #[test]
    fn default_config_is_gaussian_preset() {
        let config = DetectionConfig::default();
        assert_eq!(config, DetectionConfig::preset(Preset::Gaussian));
        assert_eq!(config.border_color, BorderColor::new(0, 255, 0));
        assert_eq!(config.gradient_operator, GradientOperator::Scharr);
        assert_eq!(config.blur_method, BlurMethod::Gaussian);
        assert_eq!(config.blur_kernel_size, KernelSize::square(9));
        assert_eq!(config.threshold, 237);
        assert_eq!(config.closing_kernel_size, KernelSize::square(29));
        assert_eq!(config.erode_dilate_iterations, 4);
        assert!((config.stroke_width - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn box_preset_matches_historical_values() {
        let config = DetectionConfig::preset(Preset::Box);
        assert_eq!(config.blur_method, BlurMethod::Box);
        assert_eq!(config.threshold, 225);
        assert_eq!(config.closing_kernel_size, KernelSize::new(21, 7));
    }

    #[test]
    fn presets_validate() {
        assert!(DetectionConfig::preset(Preset::Gaussian).validate().is_ok());
        assert!(DetectionConfig::preset(Preset::Box).validate().is_ok());
    }

    #[test]
    fn even_blur_kernel_is_rejected() {
        let config = DetectionConfig {
            blur_kernel_size: KernelSize::new(8, 9),
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DetectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_closing_kernel_is_rejected() {
        let config = DetectionConfig {
            closing_kernel_size: KernelSize::new(0, 7),
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DetectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn closing_kernel_is_limited_to_mask_side() {
        let at_limit = DetectionConfig {
            closing_kernel_size: KernelSize::new(511, 3),
            ..DetectionConfig::default()
        };
        assert!(at_limit.validate().is_ok());
        let too_wide = DetectionConfig {
            closing_kernel_size: KernelSize::new(512, 3),
            ..DetectionConfig::default()
        };
        assert!(matches!(
            too_wide.validate(),
            Err(DetectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn non_positive_stroke_is_rejected() {
        for stroke_width in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = DetectionConfig {
                stroke_width,
                ..DetectionConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(DetectionError::InvalidConfig(_))),
                "stroke width {stroke_width} should be rejected",
            );
        }
    }

    #[test]
    fn zero_iterations_is_allowed() {
        let config = DetectionConfig {
            erode_dilate_iterations: 0,
            ..DetectionConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    // --- Serde round-trip tests ---

    #[test]
    fn detection_config_serde_round_trip() {
        let config = DetectionConfig {
            border_color: BorderColor::new(255, 0, 0),
            gradient_operator: GradientOperator::Sobel,
            blur_method: BlurMethod::Box,
            blur_kernel_size: KernelSize::new(7, 5),
            threshold: 200,
            closing_kernel_size: KernelSize::new(21, 7),
            erode_dilate_iterations: 2,
            stroke_width: 5.0,
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{"threshold": 200, "border_color": "255:0:0"}"#).unwrap();
        assert_eq!(config.threshold, 200);
        assert_eq!(config.border_color, BorderColor::new(255, 0, 0));
        assert_eq!(config.closing_kernel_size, KernelSize::square(29));
    }

    #[test]
    fn config_json_rejects_bad_color() {
        let result: Result<DetectionConfig, _> =
            serde_json::from_str(r#"{"border_color": "300:0:0"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn detection_error_serde_round_trip() {
        for err in [
            DetectionError::InvalidConfig("bad".to_string()),
            DetectionError::InvalidImage("empty".to_string()),
            DetectionError::NoRegionFound,
        ] {
            let json = serde_json::to_string(&err).unwrap();
            let deserialized: DetectionError = serde_json::from_str(&json).unwrap();
            assert_eq!(err, deserialized);
        }
    }

    #[test]
    fn error_display() {
        assert_eq!(
            DetectionError::NoRegionFound.to_string(),
            "no barcode-like region found in the image",
        );
        assert_eq!(
            DetectionError::InvalidImage("zero width".to_string()).to_string(),
            "invalid image: zero width",
        );
    }
}
