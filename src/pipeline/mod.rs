//! The per-page reading pipeline, from raw document bytes to a
//! [`PageReadout`].
//!
//! Stages run strictly in order for each page: ingest, anchor detection,
//! orientation, remapping, rectification, extraction, recognition,
//! audit. Pages are independent; a fatal error on one page is recorded
//! in its slot and the remaining pages still run. Pixel buffers are
//! handed off move-style so each stage's input is dropped as soon as the
//! next stage owns its output.

pub mod debug;
pub mod detect;
pub mod extract;
pub mod ingest;
pub mod orient;
pub mod rectify;
pub mod remap;
pub mod stats;

pub use debug::{DebugSink, NullSink};
pub use detect::{AnchorDetection, Corner, detect_anchors};
pub use extract::{ExtractedRegion, extract_regions};
pub use ingest::{DocumentSource, ScanBuffer, SourceKind, for_each_scan};
pub use orient::{OrientationSource, RingTargetOrientation, Rotation, resolve_orientation};
pub use rectify::rectify_scan;
pub use remap::{remap_detections, remap_detections_degrees};
pub use stats::StageStats;

use crate::core::constants::DEFAULT_REDUNDANCY_STRIDE;
use crate::core::{ModelRegion, ReadError, ReadResult, ReaderConfig};
use crate::recognition::{PageReadout, recognize_regions};
use image::{DynamicImage, RgbImage, imageops};
use tracing::{info, warn};

/// Drives the full pipeline over a document.
///
/// Owns all per-run state: configuration, timing statistics and the
/// diagnostic sink. Two readers never share caches, so concurrent
/// documents cannot corrupt each other.
pub struct BordereauReader {
    config: ReaderConfig,
    stats: StageStats,
    sink: Box<dyn DebugSink>,
    orientation: Box<dyn OrientationSource>,
    fallback_orientation: Option<Box<dyn OrientationSource>>,
}

impl BordereauReader {
    pub fn new(config: ReaderConfig) -> BordereauReader {
        BordereauReader {
            config,
            stats: StageStats::new(),
            sink: Box::new(NullSink),
            orientation: Box::new(RingTargetOrientation),
            fallback_orientation: None,
        }
    }

    /// Replaces the diagnostic sink.
    pub fn with_debug_sink(mut self, sink: Box<dyn DebugSink>) -> BordereauReader {
        self.sink = sink;
        self
    }

    /// Installs a secondary orientation source, consulted only when the
    /// ring-target vote is indeterminate.
    pub fn with_orientation_fallback(mut self, source: Box<dyn OrientationSource>) -> BordereauReader {
        self.fallback_orientation = Some(source);
        self
    }

    /// Per-stage timing accumulated so far.
    pub fn stats(&self) -> &StageStats {
        &self.stats
    }

    /// Reads every page of `source`, returning one slot per page.
    ///
    /// A page that fails, at ingestion or anywhere later in the
    /// pipeline, keeps its error in its slot; sibling pages are
    /// unaffected. Slots come back in page order.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::DocumentSource`] only when the document
    /// itself cannot be opened.
    pub fn read_document(
        &self,
        source: DocumentSource<'_>,
        regions: &[ModelRegion],
    ) -> ReadResult<Vec<ReadResult<PageReadout>>> {
        let mut pages = Vec::new();
        for_each_scan(source, self.config.max_pages, |scan| {
            let page_index = pages.len();
            let outcome = scan.and_then(|scan| self.read_page(scan, regions));
            if let Err(error) = &outcome {
                warn!(page = page_index, %error, "page failed");
            }
            pages.push(outcome);
        })?;
        Ok(pages)
    }

    /// Runs one page through detection, rectification and recognition.
    pub fn read_page(&self, scan: ScanBuffer, regions: &[ModelRegion]) -> ReadResult<PageReadout> {
        let page_index = scan.page_index();
        let record_debug = scan.debug();
        let geometry = &self.config.geometry;

        let detections = self
            .stats
            .time("detect", || detect_anchors(&scan, geometry))?;

        let found: Vec<AnchorDetection> = detections.iter().flatten().copied().collect();
        let rotation = self
            .orientation
            .resolve(&found)
            .or_else(|| {
                self.fallback_orientation
                    .as_ref()
                    .and_then(|source| source.resolve(&found))
            })
            .ok_or_else(|| {
                ReadError::alignment(format!(
                    "page {page_index}: document orientation could not be determined from {} anchors",
                    found.len()
                ))
            })?;

        let (width, height) = (scan.width(), scan.height());
        let upright = self
            .stats
            .time("orient", || rotate_upright(scan.into_image(), rotation));
        let detections = remap_detections(&detections, rotation, width, height);

        info!(
            page = page_index,
            rotation = rotation.degrees(),
            anchors = found.len(),
            "page oriented"
        );

        let rectified = self
            .stats
            .time("rectify", || rectify_scan(&upright, &detections, geometry))?;
        drop(upright);

        if record_debug {
            self.sink
                .snapshot("rectify", 0, &DynamicImage::ImageRgb8(rectified.clone()));
        }

        let crops = self.stats.time("extract", || {
            extract_regions(&rectified, regions, geometry, self.config.region_padding_mm)
        });
        drop(rectified);

        if record_debug {
            for (step, crop) in crops.iter().enumerate() {
                self.sink.snapshot(
                    "extract",
                    step as u32,
                    &DynamicImage::ImageRgb8(crop.image.clone()),
                );
            }
        }

        let results = self
            .stats
            .time("recognize", || recognize_regions(&crops, &self.config.recognizer))?;

        // Default verdict policy: a cell fails when the two recognizers
        // cannot agree on a single character.
        let failed_indices: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, result)| result.consensus().is_none())
            .map(|(index, _)| index)
            .collect();

        let readout = PageReadout::assemble(
            page_index,
            results,
            failed_indices,
            DEFAULT_REDUNDANCY_STRIDE,
        );

        info!(
            page = page_index,
            regions = readout.results.len(),
            failed = readout.failed_indices.len(),
            unrecoverable = readout.unrecoverable,
            "page read"
        );
        Ok(readout)
    }
}

/// Rotates the scan to upright given its detected rotation.
fn rotate_upright(image: RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::R0 => image,
        Rotation::R90 => imageops::rotate90(&image),
        Rotation::R180 => imageops::rotate180(&image),
        Rotation::R270 => imageops::rotate270(&image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rotate_upright_dimensions() {
        let image = RgbImage::from_pixel(30, 50, Rgb([255, 255, 255]));
        assert_eq!(rotate_upright(image.clone(), Rotation::R0).dimensions(), (30, 50));
        assert_eq!(rotate_upright(image.clone(), Rotation::R90).dimensions(), (50, 30));
        assert_eq!(rotate_upright(image.clone(), Rotation::R180).dimensions(), (30, 50));
        assert_eq!(rotate_upright(image, Rotation::R270).dimensions(), (50, 30));
    }

    #[test]
    fn test_rotate_matches_remap_formula() {
        // A pixel at (x, y) must land where the detection remap sends it,
        // up to the half-pixel offset between centers and indices.
        let mut image = RgbImage::from_pixel(20, 10, Rgb([255, 255, 255]));
        image.put_pixel(4, 2, Rgb([0, 0, 0]));

        let turned = rotate_upright(image, Rotation::R90);
        // (x, y) -> (h - 1 - y, x)
        assert_eq!(turned.get_pixel(10 - 1 - 2, 4).0, [0, 0, 0]);
    }

    #[test]
    fn test_reader_owns_independent_stats() {
        let reader = BordereauReader::new(ReaderConfig::default());
        reader.stats().record("detect", std::time::Duration::from_millis(1));
        let other = BordereauReader::new(ReaderConfig::default());
        assert_eq!(other.stats().calls("detect"), 0);
        assert_eq!(reader.stats().calls("detect"), 1);
    }

    #[test]
    fn test_unreadable_page_fills_slot_without_aborting() {
        // Undecodable page data must land in that page's slot as an
        // error; the document-level call still succeeds.
        let reader = BordereauReader::new(ReaderConfig::default());
        let source = DocumentSource {
            data: &[0xba, 0xad],
            kind: SourceKind::Png,
        };
        let pages = reader.read_document(source, &[]).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(matches!(
            pages[0],
            Err(crate::core::ReadError::DocumentSource { .. })
        ));
    }

    #[test]
    fn test_rotated_page_reads_through_extraction() {
        // Geometry path end to end, short of the recognition engines:
        // a synthetic four-target page turned a quarter clockwise must
        // come back upright, rectify to the usable area and yield crops
        // at the theoretical cell coordinates.
        let geometry = crate::core::TemplateGeometry::default();
        let turned = imageops::rotate270(&detect::fixtures::synthetic_page());
        let scan = ScanBuffer::new(DynamicImage::ImageRgb8(turned), 0, false);

        let detections = detect_anchors(&scan, &geometry).unwrap();
        let found: Vec<AnchorDetection> = detections.iter().flatten().copied().collect();
        assert_eq!(resolve_orientation(&found), Some(Rotation::R90));

        let (width, height) = (scan.width(), scan.height());
        let upright = rotate_upright(scan.into_image(), Rotation::R90);
        let remapped = remap_detections(&detections, Rotation::R90, width, height);

        let rectified = rectify_scan(&upright, &remapped, &geometry).unwrap();
        // Usable A4 area (180 x 267 mm) at 4 px/mm.
        assert_eq!(rectified.dimensions(), (720, 1068));

        let to_pt = |mm: f32| mm / crate::core::constants::MM_PER_POINT;
        let regions = vec![crate::core::ModelRegion {
            name: "cell0".to_string(),
            x: to_pt(25.0),
            y: to_pt(25.0),
            width: to_pt(8.0),
            height: to_pt(8.0),
        }];
        let crops = extract_regions(&rectified, &regions, &geometry, 0.0);
        assert_eq!(crops.len(), 1);
        // 10 mm into the usable area plus the 0.5 mm inset, at 4 px/mm;
        // 8 mm cell minus the 1 mm shrink. The mm -> points -> mm round
        // trip is float, so allow one pixel of slack.
        let (x, y, w, h) = crops[0].bounds;
        for (actual, expected) in [(x, 42), (y, 42), (w, 28), (h, 28)] {
            assert!(
                (actual as i64 - expected).abs() <= 1,
                "bounds {:?}",
                crops[0].bounds
            );
        }
    }
}
