//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! [`detect_with_diagnostics`] drives the staged [`Pipeline`] and records
//! how long every stage took together with the counts that matter when
//! tuning thresholds and kernel sizes (foreground pixels after each mask
//! operation, contours considered, the chosen area).
//!
//! Timestamps come from a caller-supplied [`Clock`] so this crate stays
//! free of platform time sources. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration`
//! does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{BoundingBox, Detection, DetectionConfig, DetectionError, RgbImage};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Color to luminance conversion.
    pub grayscale: StageDiagnostics,
    /// Directional gradient map.
    pub gradient: StageDiagnostics,
    /// Blur and threshold.
    pub denoise: StageDiagnostics,
    /// Morphological closing.
    pub close: StageDiagnostics,
    /// Erosion/dilation cleanup.
    pub refine: StageDiagnostics,
    /// Contour extraction and rectangle fitting.
    pub region_selection: StageDiagnostics,
    /// Drawing the bounding box.
    pub annotate: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the outcome.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Gradient map.
    Gradient {
        /// Derivative kernel family.
        operator: String,
        /// Strongest response in the map.
        max_response: u8,
    },
    /// Blur and threshold.
    Denoise {
        /// Blur method.
        method: String,
        /// Blur kernel, `"WxH"`.
        kernel: String,
        /// Binarization cutoff.
        threshold: u8,
        /// Pixels at or above the cutoff.
        foreground_pixels: u64,
        /// Total pixel count, for density.
        total_pixels: u64,
    },
    /// Closing.
    Close {
        /// Structuring element, `"WxH"`.
        kernel: String,
        /// Set pixels after closing.
        foreground_pixels: u64,
    },
    /// Cleanup.
    Refine {
        /// Erosion (and dilation) count.
        iterations: u32,
        /// Set pixels after cleanup.
        foreground_pixels: u64,
    },
    /// Region selection.
    RegionSelection {
        /// External contours considered.
        contour_count: usize,
        /// Enclosed area of the winner.
        region_area: f64,
        /// Rectangle extent along its angle.
        rect_width: f64,
        /// Rectangle extent perpendicular to its angle.
        rect_height: f64,
        /// Rectangle rotation in degrees.
        rect_angle: f64,
    },
    /// Annotation.
    Annotate {
        /// Border color, `"r:g:b"`.
        color: String,
        /// Stroke width in pixels.
        stroke_width: f32,
    },
}

/// High-level outcome of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// External contours considered.
    pub contour_count: usize,
    /// Area of the selected region.
    pub region_area: f64,
    /// Integer corners of the drawn box.
    pub bounding_box: BoundingBox,
}

impl PipelineDiagnostics {
    /// Per-stage entries in execution order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Grayscale", &self.grayscale),
            ("Gradient", &self.gradient),
            ("Denoise", &self.denoise),
            ("Close", &self.close),
            ("Refine", &self.refine),
            ("Region Selection", &self.region_selection),
            ("Annotate", &self.annotate),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Detection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let corners: Vec<String> = self
            .summary
            .bounding_box
            .corners()
            .iter()
            .map(|p| format!("({}, {})", p.x, p.y))
            .collect();
        lines.push(format!(
            "Contours: {}  |  Region area: {:.1}  |  Box: {}",
            self.summary.contour_count,
            self.summary.region_area,
            corners.join(" "),
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Gradient {
            operator,
            max_response,
        } => format!("{operator} max={max_response}"),
        StageMetrics::Denoise {
            method,
            kernel,
            threshold,
            foreground_pixels,
            total_pixels,
        } => format!(
            "{method} {kernel} >={threshold} fg={foreground_pixels} ({:.1}%)",
            percent(*foreground_pixels, *total_pixels),
        ),
        StageMetrics::Close {
            kernel,
            foreground_pixels,
        } => format!("{kernel} fg={foreground_pixels}"),
        StageMetrics::Refine {
            iterations,
            foreground_pixels,
        } => format!("x{iterations} fg={foreground_pixels}"),
        StageMetrics::RegionSelection {
            contour_count,
            region_area,
            rect_width,
            rect_height,
            rect_angle,
        } => format!(
            "{contour_count} contours, area={region_area:.1} rect={rect_width:.1}x{rect_height:.1} @ {rect_angle:.1}deg",
        ),
        StageMetrics::Annotate {
            color,
            stroke_width,
        } => format!("color={color} width={stroke_width}"),
    }
}

/// Time one stage transition and capture the resulting metrics.
fn timed<C, S, F>(clock: &C, advance: F) -> Result<(S, StageDiagnostics), DetectionError>
where
    C: Clock,
    S: PipelineStage,
    F: FnOnce() -> Result<S, DetectionError>,
{
    let start = clock.now();
    let stage = advance()?;
    let duration = clock.elapsed(&start);
    tracing::trace!(stage = S::NAME, index = S::INDEX, ?duration, "stage finished");
    let metrics = stage.metrics();
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the full detection and collect per-stage diagnostics.
///
/// Produces the same [`Detection`] as [`detect_barcode`](crate::detect_barcode).
///
/// # Errors
///
/// Same as [`detect_barcode`](crate::detect_barcode).
pub fn detect_with_diagnostics<C: Clock>(
    image: RgbImage,
    config: &DetectionConfig,
    clock: &C,
) -> Result<(Detection, PipelineDiagnostics), DetectionError> {
    let total_start = clock.now();
    let pending = Pipeline::new(image, config.clone())?;

    let (gray, grayscale) = timed(clock, || Ok(pending.grayscale()))?;
    let (mapped, gradient) = timed(clock, || Ok(gray.map_gradient()))?;
    let (denoised, denoise) = timed(clock, || Ok(mapped.suppress_noise()))?;
    let (closed, close) = timed(clock, || Ok(denoised.close()))?;
    let (refined, refine) = timed(clock, || Ok(closed.refine()))?;
    let (selected, region_selection) = timed(clock, || refined.select_region())?;
    let (annotated, annotate) = timed(clock, || selected.annotate())?;

    let total_duration = clock.elapsed(&total_start);
    let detection = annotated.into_detection();
    let summary = PipelineSummary {
        image_width: detection.dimensions.width,
        image_height: detection.dimensions.height,
        pixel_count: detection.dimensions.pixel_count(),
        contour_count: detection.contour_count,
        region_area: detection.region_area,
        bounding_box: detection.bounding_box,
    };

    Ok((
        detection,
        PipelineDiagnostics {
            grayscale,
            gradient,
            denoise,
            close,
            refine,
            region_selection,
            annotate,
            total_duration,
            summary,
        },
    ))
}
