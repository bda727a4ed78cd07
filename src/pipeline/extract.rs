//! Region-of-interest extraction from the rectified frame.
//!
//! The layout collaborator describes each handwritten cell as a rectangle
//! in document points over the full page. The rectified image only spans
//! the usable area between anchor centers, so rectangles are shifted by
//! the target margins and scaled with the same usable-area factor the
//! rectifier used. Crops are clamped to the image; a degenerate rectangle
//! clamps to one pixel instead of failing. Output ordering always matches
//! the input list: region `i` is the same logical cell everywhere
//! downstream.

use crate::core::constants::MM_PER_POINT;
use crate::core::{ModelRegion, TemplateGeometry};
use image::{RgbImage, imageops};
use tracing::debug;

/// Fixed inward shift applied to every region edge, in millimeters.
/// Backs the crop off the printed cell border so the frame line does not
/// end up in the glyph image.
const REGION_INSET_MM: f32 = 0.5;

/// Fixed shrink applied to every region extent, in millimeters.
const REGION_SHRINK_MM: f32 = 1.0;

/// A pixel crop of the rectified frame for one model region.
///
/// Ephemeral: handed straight to the recognition ensemble and dropped.
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    /// The cropped pixels.
    pub image: RgbImage,
    /// Crop origin and size in rectified-frame pixels (x, y, w, h).
    pub bounds: (u32, u32, u32, u32),
}

/// Crops one [`ExtractedRegion`] per input region, preserving order.
///
/// `padding_mm` is applied symmetrically around each rectangle; the
/// default is slightly negative (see
/// [`DEFAULT_REGION_PADDING_MM`](crate::core::constants::DEFAULT_REGION_PADDING_MM)).
/// The template geometry must match the generation-time values or every
/// crop lands next to its cell.
pub fn extract_regions(
    rectified: &RgbImage,
    regions: &[ModelRegion],
    geometry: &TemplateGeometry,
    padding_mm: f32,
) -> Vec<ExtractedRegion> {
    let (format_w_mm, format_h_mm) = geometry.format.dimensions_mm();
    let margin_mm = geometry.edge_to_target_center_mm();

    let usable_w_mm = format_w_mm - 2.0 * margin_mm;
    let usable_h_mm = format_h_mm - 2.0 * margin_mm;

    let (img_w, img_h) = rectified.dimensions();
    let px_per_mm_x = img_w as f32 / usable_w_mm;
    let px_per_mm_y = img_h as f32 / usable_h_mm;

    let pad_x = padding_mm * px_per_mm_x;
    let pad_y = padding_mm * px_per_mm_y;

    regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let x = (region.x * MM_PER_POINT - margin_mm + REGION_INSET_MM) * px_per_mm_x;
            let y = (region.y * MM_PER_POINT - margin_mm + REGION_INSET_MM) * px_per_mm_y;
            let w = (region.width * MM_PER_POINT - REGION_SHRINK_MM) * px_per_mm_x;
            let h = (region.height * MM_PER_POINT - REGION_SHRINK_MM) * px_per_mm_y;

            let left = ((x - pad_x).floor().max(0.0) as u32).min(img_w.saturating_sub(1));
            let top = ((y - pad_y).floor().max(0.0) as u32).min(img_h.saturating_sub(1));
            let right = ((x + w + pad_x).ceil() as u32).min(img_w);
            let bottom = ((y + h + pad_y).ceil() as u32).min(img_h);

            let width_px = right.saturating_sub(left).max(1);
            let height_px = bottom.saturating_sub(top).max(1);

            debug!(
                index,
                name = %region.name,
                left,
                top,
                width = width_px,
                height = height_px,
                "region cropped"
            );

            ExtractedRegion {
                image: imageops::crop_imm(rectified, left, top, width_px, height_px).to_image(),
                bounds: (left, top, width_px, height_px),
            }
        })
        .collect()
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

    fn region(name: &str, x_mm: f32, y_mm: f32, side_mm: f32) -> ModelRegion {
        // Layout coordinates arrive in document points.
        let to_pt = |mm: f32| mm / MM_PER_POINT;
        ModelRegion {
            name: name.to_string(),
            x: to_pt(x_mm),
            y: to_pt(y_mm),
            width: to_pt(side_mm),
            height: to_pt(side_mm),
        }
    }

    /// Usable A4 area (180 x 267 mm) at 2 px/mm.
    fn frame() -> RgbImage {
        RgbImage::from_pixel(360, 534, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_output_count_and_order_match_input() {
        let regions: Vec<ModelRegion> = (0..6)
            .map(|i| region(&format!("cell{i}"), 20.0 + 10.0 * i as f32, 100.0, 8.0))
            .collect();
        let crops = extract_regions(&frame(), &regions, &geometry(), 0.0);
        assert_eq!(crops.len(), regions.len());
        // Crops must come back left to right, like the input.
        let xs: Vec<u32> = crops.iter().map(|c| c.bounds.0).collect();
        let mut sorted = xs.clone();
        sorted.sort_unstable();
        assert_eq!(xs, sorted);
    }

    #[test]
    fn test_crop_lands_on_expected_pixels() {
        // Cell at 25.2 mm from the page edge = 10.2 mm into the usable
        // area; with the 0.5 mm inset that is 10.7 mm -> 21.4 px at
        // 2 px/mm, floored to 21.
        let regions = vec![region("cell", 25.2, 25.2, 8.2)];
        let crops = extract_regions(&frame(), &regions, &geometry(), 0.0);
        let (x, y, w, h) = crops[0].bounds;
        assert_eq!((x, y), (21, 21));
        // 8.2 mm minus the 1 mm shrink = 7.2 mm -> right edge at
        // 35.8 px, ceiled to 36.
        assert_eq!((w, h), (15, 15));
    }

    #[test]
    fn test_negative_padding_shrinks_crop() {
        let regions = vec![region("cell", 25.0, 25.0, 8.0)];
        let tight = extract_regions(&frame(), &regions, &geometry(), -1.0);
        let loose = extract_regions(&frame(), &regions, &geometry(), 1.0);
        assert!(tight[0].bounds.2 < loose[0].bounds.2);
    }

    #[test]
    fn test_out_of_bounds_region_clamps() {
        let regions = vec![region("edge", 200.0, 290.0, 8.0)];
        let crops = extract_regions(&frame(), &regions, &geometry(), 0.0);
        let (x, y, w, h) = crops[0].bounds;
        assert!(x + w <= 360 + 1 && y + h <= 534 + 1);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn test_degenerate_region_clamps_to_one_pixel() {
        let regions = vec![region("dot", 25.0, 25.0, 1.0)];
        let crops = extract_regions(&frame(), &regions, &geometry(), 0.0);
        assert!(crops[0].bounds.2 >= 1);
        assert!(crops[0].bounds.3 >= 1);
        assert_eq!(crops[0].image.width(), crops[0].bounds.2);
    }
}
