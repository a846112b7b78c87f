//! Planar geometry on contour point sets: enclosed area, convex hull and
//! the minimal-area oriented rectangle.

use geo::{Area, ConvexHull, Coord, LineString, MultiPoint, Polygon};

use crate::types::{OrientedRectangle, PixelPoint, Point};

fn to_coord(p: PixelPoint) -> Coord<f64> {
    Coord {
        x: f64::from(p.x),
        y: f64::from(p.y),
    }
}

/// Area enclosed by a closed contour (shoelace formula, unsigned).
///
/// Contours with fewer than three points enclose nothing.
#[must_use]
pub fn contour_area(points: &[PixelPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let ring: LineString<f64> = points.iter().copied().map(to_coord).collect();
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Convex hull vertices, counter-clockwise, without the closing repeat.
#[must_use]
pub fn convex_hull(points: &[PixelPoint]) -> Vec<Point> {
    let cloud: MultiPoint<f64> = points
        .iter()
        .copied()
        .map(|p| geo::Point::from(to_coord(p)))
        .collect();
    let hull = cloud.convex_hull();
    let mut vertices: Vec<Point> = hull
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

/// Minimal-area rectangle enclosing `points`, at any rotation.
///
/// The optimal rectangle has one side collinear with a convex hull edge,
/// so every hull edge direction is tried and the smallest area wins (the
/// first one on ties). Returns `None` for an empty point set. A single
/// point gives a zero-size rectangle; collinear points give a
/// zero-height one along their common line.
#[must_use]
pub fn min_area_rect(points: &[PixelPoint]) -> Option<OrientedRectangle> {
    let hull = convex_hull(points);
    match hull.as_slice() {
        [] => None,
        [only] => Some(OrientedRectangle {
            center: *only,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        }),
        _ => calipers(&hull),
    }
}

/// Extents of `hull` projected on the unit axis `(ux, uy)` and its normal.
struct Projection {
    area: f64,
    rect: OrientedRectangle,
}

fn project(hull: &[Point], ux: f64, uy: f64) -> Projection {
    let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in hull {
        let u = p.x.mul_add(ux, p.y * uy);
        let v = p.x.mul_add(-uy, p.y * ux);
        min_u = min_u.min(u);
        max_u = max_u.max(u);
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    let (width, height) = (max_u - min_u, max_v - min_v);
    let (cu, cv) = (f64::midpoint(min_u, max_u), f64::midpoint(min_v, max_v));
    Projection {
        area: width * height,
        rect: OrientedRectangle {
            center: Point::new(cu.mul_add(ux, -cv * uy), cu.mul_add(uy, cv * ux)),
            width,
            height,
            angle: uy.atan2(ux).to_degrees(),
        },
    }
}

fn calipers(hull: &[Point]) -> Option<OrientedRectangle> {
    let mut best: Option<Projection> = None;
    for (i, a) in hull.iter().enumerate() {
        let b = hull[(i + 1) % hull.len()];
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if len <= f64::EPSILON {
            continue;
        }
        let candidate = project(hull, dx / len, dy / len);
        if best.as_ref().is_none_or(|b| candidate.area < b.area) {
            best = Some(candidate);
        }
    }
    best.map(|p| p.rect)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<PixelPoint> {
        raw.iter().map(|&(x, y)| PixelPoint::new(x, y)).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn square_area() {
        let square = pts(&[(0, 0), (4, 0), (4, 4), (0, 4)]);
        assert_close(contour_area(&square), 16.0);
    }

    #[test]
    fn area_ignores_orientation() {
        let cw = pts(&[(0, 0), (0, 3), (5, 3), (5, 0)]);
        assert_close(contour_area(&cw), 15.0);
    }

    #[test]
    fn degenerate_contours_have_zero_area() {
        assert_close(contour_area(&pts(&[])), 0.0);
        assert_close(contour_area(&pts(&[(3, 3)])), 0.0);
        assert_close(contour_area(&pts(&[(0, 0), (5, 0)])), 0.0);
    }

    #[test]
    fn hull_drops_interior_points() {
        let cloud = pts(&[(0, 0), (10, 0), (10, 10), (0, 10), (5, 5), (3, 7)]);
        let hull = convex_hull(&cloud);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(5.0, 5.0)));
    }

    #[test]
    fn empty_set_has_no_rectangle() {
        assert!(min_area_rect(&[]).is_none());
    }

    #[test]
    fn single_point_rectangle() {
        let rect = min_area_rect(&pts(&[(7, 9)])).unwrap();
        assert_eq!(rect.center, Point::new(7.0, 9.0));
        assert_close(rect.area(), 0.0);
    }

    #[test]
    fn collinear_points_give_flat_rectangle() {
        let rect = min_area_rect(&pts(&[(0, 0), (3, 0), (6, 0)])).unwrap();
        assert_close(rect.height.min(rect.width), 0.0);
        assert_close(rect.height.max(rect.width), 6.0);
        assert_close(rect.center.x, 3.0);
        assert_close(rect.center.y, 0.0);
    }

    #[test]
    fn axis_aligned_rectangle_is_recovered() {
        let rect = min_area_rect(&pts(&[(2, 3), (12, 3), (12, 7), (2, 7), (6, 5)])).unwrap();
        assert_close(rect.area(), 40.0);
        assert_close(rect.center.x, 7.0);
        assert_close(rect.center.y, 5.0);
    }

    #[test]
    fn rotated_square_is_tighter_than_its_bounding_box() {
        // A diamond: axis-aligned box is 8x8 = 64, true minimum is 32.
        let diamond = pts(&[(4, 0), (8, 4), (4, 8), (0, 4)]);
        let rect = min_area_rect(&diamond).unwrap();
        assert_close(rect.area(), 32.0);
        assert_close(rect.angle.rem_euclid(90.0), 45.0);
    }

    #[test]
    fn rectangle_corners_enclose_every_point() {
        let cloud = pts(&[(1, 1), (9, 3), (8, 7), (2, 5), (5, 4), (6, 2)]);
        let rect = min_area_rect(&cloud).unwrap();
        let corners = rect.corners();
        for p in &cloud {
            let (px, py) = (f64::from(p.x), f64::from(p.y));
            // Inside a convex quad: same side of every edge.
            let sides: Vec<f64> = (0..4)
                .map(|i| {
                    let (a, b) = (corners[i], corners[(i + 1) % 4]);
                    (b.x - a.x).mul_add(py - a.y, -(b.y - a.y) * (px - a.x))
                })
                .collect();
            let all_non_neg = sides.iter().all(|&s| s >= -1e-6);
            let all_non_pos = sides.iter().all(|&s| s <= 1e-6);
            assert!(all_non_neg || all_non_pos, "{p:?} outside {corners:?}");
        }
    }
}
