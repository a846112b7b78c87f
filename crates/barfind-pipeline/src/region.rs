//! Region selection: trace the outer borders of the cleaned mask and keep
//! the one enclosing the largest area.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour};
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::types::{DetectionError, OrientedRectangle, PixelPoint};

/// Outer border of one connected foreground component.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Border pixels in tracing order.
    pub points: Vec<PixelPoint>,
    /// Enclosed area (shoelace over `points`).
    pub area: f64,
}

impl Region {
    fn from_contour(contour: Contour<u32>) -> Self {
        let points: Vec<PixelPoint> = contour
            .points
            .into_iter()
            .map(|p| PixelPoint::new(saturating_i32(p.x), saturating_i32(p.y)))
            .collect();
        let area = geometry::contour_area(&points);
        Self { points, area }
    }

    /// Minimal-area rectangle around this region.
    #[must_use]
    pub fn min_area_rect(&self) -> Option<OrientedRectangle> {
        geometry::min_area_rect(&self.points)
    }
}

fn saturating_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Summary of the selection, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Number of external contours considered.
    pub contour_count: usize,
    /// Index of the winner in tracing order.
    pub index: usize,
    /// Area of the winner.
    pub area: f64,
}

/// Outer borders of every top-level foreground component in `mask`.
///
/// Holes and components nested inside holes are skipped.
#[must_use]
pub fn external_regions(mask: &GrayImage) -> Vec<Region> {
    imageproc::contours::find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(Region::from_contour)
        .collect()
}

/// Pick the region with the largest enclosed area.
///
/// Ties go to the region traced first.
///
/// # Errors
///
/// Returns [`DetectionError::NoRegionFound`] if `regions` is empty.
pub fn largest(regions: &[Region]) -> Result<Selection, DetectionError> {
    let mut best: Option<(usize, f64)> = None;
    for (i, region) in regions.iter().enumerate() {
        if best.is_none_or(|(_, area)| region.area > area) {
            best = Some((i, region.area));
        }
    }
    let (index, area) = best.ok_or(DetectionError::NoRegionFound)?;
    Ok(Selection {
        contour_count: regions.len(),
        index,
        area,
    })
}
