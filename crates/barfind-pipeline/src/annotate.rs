//! Drawing the detected region onto the source image.
//!
//! The closed quadrilateral is stroked with `tiny-skia` into a
//! transparent layer the size of the image, which is then composited
//! over a copy of the original. Anti-aliasing is off so the outline is
//! exactly the configured color.

use image::{Rgb, RgbImage};
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::color::BorderColor;
use crate::types::{BoundingBox, DetectionError};

/// Return a copy of `image` with `bbox` outlined in `color`.
///
/// Corners are joined in order and the path is closed. Corners may lie
/// outside the image; the stroke is clipped to the frame. A box whose
/// corners all coincide leaves the image untouched.
///
/// # Errors
///
/// Returns [`DetectionError::InvalidImage`] if a drawing surface of the
/// image's size cannot be allocated (zero or oversized dimensions).
#[allow(clippy::cast_precision_loss)]
pub fn draw_bounding_box(
    image: &RgbImage,
    bbox: &BoundingBox,
    color: BorderColor,
    stroke_width: f32,
) -> Result<RgbImage, DetectionError> {
    let (width, height) = image.dimensions();
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return Err(DetectionError::InvalidImage(format!(
            "cannot allocate a {width}x{height} drawing surface"
        )));
    };

    // Integer coordinates address pixel centers.
    let to_canvas = |v: i32| v as f32 + 0.5;
    let [first, rest @ ..] = bbox.corners();
    let mut pb = PathBuilder::new();
    pb.move_to(to_canvas(first.x), to_canvas(first.y));
    for p in rest {
        pb.line_to(to_canvas(p.x), to_canvas(p.y));
    }
    pb.close();

    let mut annotated = image.clone();
    let Some(path) = pb.finish() else {
        tracing::debug!(?bbox, "degenerate bounding box, nothing drawn");
        return Ok(annotated);
    };

    let stroke = Stroke {
        width: stroke_width,
        line_cap: LineCap::Square,
        line_join: LineJoin::Miter,
        ..Stroke::default()
    };
    let Rgb([r, g, b]) = color.to_rgb();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = false;

    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    composite(&mut annotated, &pixmap);
    Ok(annotated)
}

/// Source-over blend of a premultiplied RGBA layer onto `base`.
#[allow(clippy::cast_possible_truncation)]
fn composite(base: &mut RgbImage, layer: &Pixmap) {
    for (dst, src) in base.pixels_mut().zip(layer.data().chunks_exact(4)) {
        let alpha = u16::from(src[3]);
        if alpha == 0 {
            continue;
        }
        let keep = 255 - alpha;
        for (channel, &premultiplied) in dst.0.iter_mut().zip(src) {
            let blended = u16::from(premultiplied) + (u16::from(*channel) * keep + 127) / 255;
            *channel = blended.min(255) as u8;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PixelPoint;

    const RED: BorderColor = BorderColor::new(255, 0, 0);

    fn square_box(x0: i32, y0: i32, x1: i32, y1: i32) -> BoundingBox {
        BoundingBox([
            PixelPoint::new(x0, y0),
            PixelPoint::new(x1, y0),
            PixelPoint::new(x1, y1),
            PixelPoint::new(x0, y1),
        ])
    }

    fn count_color(img: &RgbImage, color: BorderColor) -> usize {
        img.pixels().filter(|p| **p == color.to_rgb()).count()
    }

    #[test]
    fn dimensions_are_unchanged() {
        let img = RgbImage::new(64, 48);
        let out = draw_bounding_box(&img, &square_box(10, 10, 50, 30), RED, 3.0).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn outline_uses_exact_color_on_the_corners() {
        let img = RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]));
        let out = draw_bounding_box(&img, &square_box(10, 10, 50, 30), RED, 3.0).unwrap();
        for (x, y) in [(10, 10), (50, 10), (50, 30), (10, 30), (30, 10), (10, 20)] {
            assert_eq!(*out.get_pixel(x, y), Rgb([255, 0, 0]), "pixel ({x},{y})");
        }
    }

    #[test]
    fn interior_and_exterior_are_untouched() {
        let img = RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]));
        let out = draw_bounding_box(&img, &square_box(10, 10, 50, 30), RED, 3.0).unwrap();
        assert_eq!(*out.get_pixel(30, 20), Rgb([40, 40, 40]));
        assert_eq!(*out.get_pixel(2, 2), Rgb([40, 40, 40]));
        assert_eq!(*out.get_pixel(60, 44), Rgb([40, 40, 40]));
    }

    #[test]
    fn only_the_configured_color_is_added() {
        let img = RgbImage::new(64, 48);
        let out = draw_bounding_box(&img, &square_box(10, 10, 50, 30), RED, 2.0).unwrap();
        for p in out.pixels() {
            assert!(*p == Rgb([0, 0, 0]) || *p == Rgb([255, 0, 0]), "{p:?}");
        }
    }

    #[test]
    fn wider_stroke_paints_more_pixels() {
        let img = RgbImage::new(64, 48);
        let bbox = square_box(10, 10, 50, 30);
        let thin = count_color(&draw_bounding_box(&img, &bbox, RED, 1.0).unwrap(), RED);
        let thick = count_color(&draw_bounding_box(&img, &bbox, RED, 5.0).unwrap(), RED);
        assert!(thick > thin, "thin={thin} thick={thick}");
    }

    #[test]
    fn corners_outside_the_frame_are_clipped() {
        let img = RgbImage::new(20, 20);
        let out = draw_bounding_box(&img, &square_box(-5, -5, 10, 25), RED, 3.0).unwrap();
        assert_eq!(out.dimensions(), (20, 20));
        assert!(count_color(&out, RED) > 0);
    }

    #[test]
    fn input_image_is_not_modified() {
        let img = RgbImage::new(32, 32);
        let _ = draw_bounding_box(&img, &square_box(4, 4, 28, 28), RED, 3.0).unwrap();
        assert_eq!(count_color(&img, RED), 0);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let result = draw_bounding_box(&RgbImage::new(0, 0), &square_box(0, 0, 1, 1), RED, 3.0);
        assert!(matches!(result, Err(DetectionError::InvalidImage(_))));
    }
}
