//! Concentric-ring calibration target detection.
//!
//! Targets are printed at the four page corners; each one's nested ring
//! count encodes its identity. Detection runs a classic contour pipeline:
//! grayscale, Gaussian blur, inverted adaptive threshold, morphological
//! opening, then a full contour tree whose parent/child links give the
//! ring count directly. Candidates are filtered on enclosing-circle
//! radius and circularity before being assigned to their nearest corner.
//!
//! Detection is a pure function of the scan buffer: identical input
//! yields identical detections.

use crate::core::constants::{
    CORNER_RING_COUNTS, DETECT_BLUR_SIGMA, DETECT_MIN_CIRCULARITY, DETECT_RADIUS_TOLERANCE,
    DETECT_THRESHOLD_BIAS, DETECT_THRESHOLD_BLOCK,
};
use crate::core::{ReadError, ReadResult, TemplateGeometry};
use crate::pipeline::ingest::ScanBuffer;
use image::{GrayImage, Luma};
use imageproc::contours::{Contour, find_contours};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;
use imageproc::point::Point;
use tracing::debug;

/// Document corner roles, in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    /// Top-left (index 0).
    TopLeft,
    /// Top-right (index 1).
    TopRight,
    /// Bottom-left (index 2).
    BottomLeft,
    /// Bottom-right (index 3).
    BottomRight,
}

impl Corner {
    /// All corners in index order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// The corner's numeric index (0..=3).
    pub fn index(&self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomLeft => 2,
            Corner::BottomRight => 3,
        }
    }

    /// The corner for a numeric index.
    ///
    /// # Panics
    ///
    /// Panics if `index > 3`; corner indices come from internal tables.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index]
    }
}

/// One detected calibration target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorDetection {
    /// Nested ring count; the target's identity.
    pub ring_count: u32,
    /// Pixel coordinates of the enclosing-circle center.
    pub center: (f32, f32),
    /// Enclosing-circle radius in pixels.
    pub radius_px: f32,
    /// Corner this target was assigned to.
    pub corner: Corner,
    /// Distance to the nearest image edge, used to rank duplicates.
    pub edge_distance: f32,
}

/// Locates up to four corner targets on a scan.
///
/// Returns one slot per corner; a missing target leaves its slot `None`
/// (partial detection is not an error; rectification decides later
/// whether enough anchors survive).
///
/// # Errors
///
/// Returns [`ReadError::TargetDetection`] when the thresholded image
/// contains no contours at all, i.e. the page is blank or unreadable.
pub fn detect_anchors(
    scan: &ScanBuffer,
    geometry: &TemplateGeometry,
) -> ReadResult<[Option<AnchorDetection>; 4]> {
    let gray = image::imageops::grayscale(scan.image());
    let blurred = imageproc::filter::gaussian_blur_f32(&gray, DETECT_BLUR_SIGMA);
    let binary = adaptive_threshold_inv(&blurred, DETECT_THRESHOLD_BLOCK, DETECT_THRESHOLD_BIAS);
    let opened = open(&binary, Norm::L1, 1);

    let contours = find_contours::<i32>(&opened);
    if contours.is_empty() {
        return Err(ReadError::target_detection(format!(
            "no contours found on page {}",
            scan.page_index()
        )));
    }

    let (width, height) = (scan.width() as f32, scan.height() as f32);
    let (format_w_mm, format_h_mm) = geometry.format.dimensions_mm();
    let pixels_per_mm = (width / format_w_mm + height / format_h_mm) / 2.0;

    let expected_radius = geometry.target_diameter_mm * pixels_per_mm / 2.0;
    let radius_min = expected_radius * DETECT_RADIUS_TOLERANCE.0;
    let radius_max = expected_radius * DETECT_RADIUS_TOLERANCE.1;

    let first_child = first_child_table(&contours);
    let mut best: [Option<AnchorDetection>; 4] = [None, None, None, None];

    for (index, contour) in contours.iter().enumerate() {
        // Only outermost shapes carry a full ring chain.
        if contour.parent.is_some() {
            continue;
        }

        let ring_count = nested_ring_count(index, &first_child);
        if !CORNER_RING_COUNTS.contains(&ring_count) {
            continue;
        }

        let Some((center, radius)) = enclosing_circle(&contour.points) else {
            continue;
        };
        if !radius.is_finite() || radius < radius_min || radius > radius_max {
            continue;
        }

        let area = polygon_area(&contour.points);
        let perimeter = polygon_perimeter(&contour.points).max(1.0);
        let circularity = 4.0 * std::f32::consts::PI * area / (perimeter * perimeter);
        if circularity < DETECT_MIN_CIRCULARITY {
            continue;
        }

        let distance_left = center.0.max(0.0);
        let distance_right = (width - center.0).max(0.0);
        let distance_top = center.1.max(0.0);
        let distance_bottom = (height - center.1).max(0.0);

        let is_right = distance_right < distance_left;
        let is_bottom = distance_bottom < distance_top;
        let corner_index = usize::from(is_bottom) * 2 + usize::from(is_right);

        let nearest_horizontal = distance_left.min(distance_right);
        let nearest_vertical = distance_top.min(distance_bottom);
        let edge_distance = nearest_horizontal.min(nearest_vertical);

        let candidate = AnchorDetection {
            ring_count,
            center,
            radius_px: radius,
            corner: Corner::from_index(corner_index),
            edge_distance,
        };

        // Per corner, keep only the candidate nearest its edge.
        match &best[corner_index] {
            Some(current) if current.edge_distance <= edge_distance => {}
            _ => best[corner_index] = Some(candidate),
        }
    }

    for detection in best.iter().flatten() {
        debug!(
            rings = detection.ring_count,
            corner = detection.corner.index(),
            x = detection.center.0,
            y = detection.center.1,
            radius = detection.radius_px,
            "calibration target detected"
        );
    }

    Ok(best)
}

/// Inverted adaptive threshold: a pixel becomes foreground (255) when it
/// is darker than its block mean minus `bias`. Block means come from an
/// integral image, so the cost is independent of block size.
fn adaptive_threshold_inv(gray: &GrayImage, block: u32, bias: i16) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let radius = (block / 2) as i64;
    let integral = integral_image::<_, u64>(gray);
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let top = (y as i64 - radius).max(0) as u32;
        let bottom = (y as i64 + radius).min(height as i64 - 1) as u32;
        for x in 0..width {
            let left = (x as i64 - radius).max(0) as u32;
            let right = (x as i64 + radius).min(width as i64 - 1) as u32;

            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
            let count = u64::from(right - left + 1) * u64::from(bottom - top + 1);
            let mean = (sum / count) as i16;

            let value = i16::from(gray.get_pixel(x, y).0[0]);
            let is_dark = value < mean - bias;
            out.put_pixel(x, y, Luma([if is_dark { 255 } else { 0 }]));
        }
    }

    out
}

/// For each contour, the index of its first child in the tree, if any.
fn first_child_table(contours: &[Contour<i32>]) -> Vec<Option<usize>> {
    let mut first_child = vec![None; contours.len()];
    for (index, contour) in contours.iter().enumerate() {
        if let Some(parent) = contour.parent
            && first_child[parent].is_none()
        {
            first_child[parent] = Some(index);
        }
    }
    first_child
}

/// Counts the nesting chain under a top-level contour by following
/// first-child links; this count is the target's identity.
fn nested_ring_count(index: usize, first_child: &[Option<usize>]) -> u32 {
    let mut count = 1;
    let mut child = first_child[index];
    while let Some(next) = child {
        count += 1;
        child = first_child[next];
    }
    count
}

/// Centroid-based enclosing circle; exact for near-circular contours.
fn enclosing_circle(points: &[Point<i32>]) -> Option<((f32, f32), f32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let cx = points.iter().map(|p| p.x as f32).sum::<f32>() / n;
    let cy = points.iter().map(|p| p.y as f32).sum::<f32>() / n;
    let radius = points
        .iter()
        .map(|p| (p.x as f32 - cx).hypot(p.y as f32 - cy))
        .fold(0.0f32, f32::max);
    Some(((cx, cy), radius))
}

/// Shoelace area of a closed contour.
fn polygon_area(points: &[Point<i32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        doubled += i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y);
    }
    (doubled.abs() as f32) / 2.0
}

/// Perimeter of a closed contour.
fn polygon_perimeter(points: &[Point<i32>]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut length = 0.0f32;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        length += ((a.x - b.x) as f32).hypot((a.y - b.y) as f32);
    }
    length
}
