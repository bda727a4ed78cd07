//! Geometric rectification: warps the rotated scan onto the document's
//! theoretical layout.
//!
//! Each detected anchor center is paired with the target's theoretical
//! position in the printed model (derived from the configured target
//! diameter and margin). With all four correspondences a projective
//! homography undoes the scanner's perspective distortion. With exactly
//! three the affine (or estimated-fourth-point) strategy is a known gap
//! and fails loudly instead of approximating; with fewer the page is
//! simply not rectifiable.

use crate::core::{ReadError, ReadResult, TemplateGeometry};
use crate::pipeline::detect::{AnchorDetection, Corner};
use crate::utils::geometry::{Point2f, perspective_transform, warp_perspective};
use image::RgbImage;
use tracing::{debug, info};

/// Theoretical center of the target at `corner`, in model millimeters.
pub fn anchor_position_mm(corner: Corner, geometry: &TemplateGeometry) -> (f32, f32) {
    let inset = geometry.edge_to_target_center_mm();
    let (width_mm, height_mm) = geometry.format.dimensions_mm();
    match corner {
        Corner::TopLeft => (inset, inset),
        Corner::TopRight => (width_mm - inset, inset),
        Corner::BottomLeft => (inset, height_mm - inset),
        Corner::BottomRight => (width_mm - inset, height_mm - inset),
    }
}

/// Warps the scan into the canonical, distortion-free frame.
///
/// The canonical frame preserves the source height; its width follows
/// the page format's aspect ratio. Destination points are translated so
/// their bounding box starts at the origin, which makes the output
/// exactly the usable area spanned by the anchor centers.
///
/// # Errors
///
/// - [`ReadError::Realignment`] with "insufficient anchor points" when
///   fewer than 3 anchors were detected; no partial image is returned.
/// - [`ReadError::Realignment`] with "not yet implemented" for exactly
///   3 anchors; the affine fallback is a documented gap.
pub fn rectify_scan(
    image: &RgbImage,
    detections: &[Option<AnchorDetection>; 4],
    geometry: &TemplateGeometry,
) -> ReadResult<RgbImage> {
    let (format_w_mm, format_h_mm) = geometry.format.dimensions_mm();

    // Canonical output size: source height kept, width from the page ratio.
    let out_height = image.height();
    let out_width = (geometry.format.aspect_ratio() * out_height as f32).round() as u32;
    let px_per_mm_x = out_width as f32 / format_w_mm;
    let px_per_mm_y = out_height as f32 / format_h_mm;

    let mut src_points = Vec::with_capacity(4);
    let mut dst_points = Vec::with_capacity(4);
    let mut corners_found = Vec::with_capacity(4);

    for corner in Corner::ALL {
        let (mm_x, mm_y) = anchor_position_mm(corner, geometry);
        let dst = Point2f::new(mm_x * px_per_mm_x, mm_y * px_per_mm_y);
        if let Some(detection) = &detections[corner.index()] {
            src_points.push(Point2f::new(detection.center.0, detection.center.1));
            dst_points.push(dst);
            corners_found.push(corner.index());
        }
    }

    match src_points.len() {
        4 => {}
        3 => {
            return Err(ReadError::realignment(
                "three-anchor affine fallback not yet implemented; all four corners must be visible",
            ));
        }
        found => {
            return Err(ReadError::realignment(format!(
                "insufficient anchor points (3 required, {found} found at corners {corners_found:?})"
            )));
        }
    }

    // Anchor the destination set at (0,0) so the warp has no border slack.
    let min_x = dst_points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let min_y = dst_points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_x = dst_points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let max_y = dst_points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    let translated: Vec<Point2f> = dst_points
        .iter()
        .map(|p| Point2f::new(p.x - min_x, p.y - min_y))
        .collect();
    let warp_width = (max_x - min_x).round() as u32;
    let warp_height = (max_y - min_y).round() as u32;

    debug!(
        width = warp_width,
        height = warp_height,
        "computing rectification homography"
    );

    let transform = perspective_transform(&src_points, &translated)?;
    let rectified = warp_perspective(image, &transform, warp_width, warp_height)?;

    info!(
        width = rectified.width(),
        height = rectified.height(),
        "scan rectified to canonical frame"
    );
    Ok(rectified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PageFormat;
    use image::Rgb;

    fn geometry() -> TemplateGeometry {
        TemplateGeometry {
            format: PageFormat::A4,
            target_diameter_mm: 10.0,
            target_margin_mm: 10.0,
        }
    }

    fn anchor(corner: usize, center: (f32, f32)) -> AnchorDetection {
        AnchorDetection {
            ring_count: crate::core::constants::CORNER_RING_COUNTS[corner],
            center,
            radius_px: 10.0,
            corner: Corner::from_index(corner),
            edge_distance: 30.0,
        }
    }

    #[test]
    fn test_anchor_positions_are_symmetric() {
        let g = geometry();
        assert_eq!(anchor_position_mm(Corner::TopLeft, &g), (15.0, 15.0));
        assert_eq!(anchor_position_mm(Corner::TopRight, &g), (195.0, 15.0));
        assert_eq!(anchor_position_mm(Corner::BottomLeft, &g), (15.0, 282.0));
        assert_eq!(anchor_position_mm(Corner::BottomRight, &g), (195.0, 282.0));
    }

    #[test]
    fn test_fewer_than_three_anchors_fails_without_partial_image() {
        let image = RgbImage::from_pixel(100, 140, Rgb([255, 255, 255]));
        let detections = [
            Some(anchor(0, (10.0, 10.0))),
            None,
            Some(anchor(2, (10.0, 130.0))),
            None,
        ];
        let result = rectify_scan(&image, &detections, &geometry());
        match result {
            Err(ReadError::Realignment { message, .. }) => {
                assert!(message.contains("insufficient anchor points"), "{message}");
            }
            other => panic!("expected realignment error, got {other:?}"),
        }
    }

    #[test]
    fn test_three_anchors_is_a_documented_gap() {
        let image = RgbImage::from_pixel(100, 140, Rgb([255, 255, 255]));
        let detections = [
            Some(anchor(0, (10.0, 10.0))),
            Some(anchor(1, (90.0, 10.0))),
            Some(anchor(2, (10.0, 130.0))),
            None,
        ];
        let result = rectify_scan(&image, &detections, &geometry());
        match result {
            Err(ReadError::Realignment { message, .. }) => {
                assert!(message.contains("not yet implemented"), "{message}");
            }
            other => panic!("expected realignment error, got {other:?}"),
        }
    }

    #[test]
    fn test_four_anchors_rectify_to_usable_area() {
        // Perfect upright scan at 2 px/mm: anchors exactly at their
        // theoretical positions; the warp is then a pure translation.
        let image = RgbImage::from_pixel(420, 594, Rgb([255, 255, 255]));
        let detections = [
            Some(anchor(0, (30.0, 30.0))),
            Some(anchor(1, (390.0, 30.0))),
            Some(anchor(2, (30.0, 564.0))),
            Some(anchor(3, (390.0, 564.0))),
        ];
        let rectified = rectify_scan(&image, &detections, &geometry()).unwrap();
        // Usable area spans 180 x 267 mm at 2 px/mm.
        assert_eq!(rectified.width(), 360);
        assert_eq!(rectified.height(), 534);
    }
}
