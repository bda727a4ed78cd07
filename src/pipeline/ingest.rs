//! Scan ingestion: normalizes a PDF page or raster image into a uniform
//! pixel buffer plus metadata.
//!
//! PDF pages are not rasterized wholesale. The page's drawing objects are
//! scanned and the embedded raster image with the largest pixel area is
//! taken to be the scan itself, which sidesteps a render pass and keeps
//! the scanner's native resolution. Bilevel image data (as produced by
//! CCITT/JBIG2 fax-style scanners) is expanded to 8-bit grayscale.

use crate::core::{ReadError, ReadResult};
use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// MIME types accepted as document sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `application/pdf`
    Pdf,
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
}

impl SourceKind {
    /// Maps a MIME type string onto a supported source kind.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::DocumentSource`] for anything outside
    /// `application/pdf`, `image/jpeg` and `image/png`.
    pub fn from_mime(mime: &str) -> ReadResult<Self> {
        match mime {
            "application/pdf" => Ok(Self::Pdf),
            "image/jpeg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            other => Err(ReadError::document_source(format!(
                "unsupported document source type: {other}"
            ))),
        }
    }
}

/// A byte buffer plus the MIME type describing it.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSource<'a> {
    /// Raw document bytes.
    pub data: &'a [u8],
    /// Source kind derived from the upload's MIME type.
    pub kind: SourceKind,
}

/// A normalized page scan ready for target detection.
///
/// Owned by the run that created it and released after rectification.
#[derive(Debug, Clone)]
pub struct ScanBuffer {
    image: RgbImage,
    channels: u8,
    page_index: usize,
    debug: bool,
    unpacked: bool,
}

impl ScanBuffer {
    /// Builds a scan buffer from a decoded image, recording the source
    /// channel count and whether bilevel data had to be expanded.
    pub fn new(decoded: DynamicImage, page_index: usize, debug: bool) -> Self {
        let channels = source_channels(&decoded);
        let (decoded, unpacked) = expand_bilevel(decoded);
        Self {
            image: decoded.into_rgb8(),
            channels,
            page_index,
            debug,
            unpacked,
        }
    }

    /// The pixel data, normalized to RGB.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Consumes the buffer, yielding the pixel data.
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Channel count of the source data (1, 3 or 4).
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Zero-based page index within the source document.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Whether diagnostic snapshots should be recorded for this page.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Whether bilevel source data was expanded to 8-bit grayscale.
    pub fn unpacked(&self) -> bool {
        self.unpacked
    }
}

/// Extracts every page scan from a document source, invoking `on_scan`
/// for each page in order. For PDFs, at most `max_pages` pages are read
/// when a cap is given; raster sources always yield a single page 0.
///
/// A page that cannot be ingested (no embedded image, undecodable data)
/// is delivered to the callback as that page's `Err`; sibling pages
/// still run. The callback owns each buffer, so page pixel data is
/// dropped as soon as the callback returns.
///
/// # Errors
///
/// Returns [`ReadError::DocumentSource`] only when the document itself
/// cannot be opened (PDFium unavailable, unparseable PDF).
pub fn for_each_scan(
    source: DocumentSource<'_>,
    max_pages: Option<usize>,
    mut on_scan: impl FnMut(ReadResult<ScanBuffer>),
) -> ReadResult<()> {
    match source.kind {
        SourceKind::Pdf => {
            let pdfium = bind_pdfium()?;
            let document = pdfium
                .load_pdf_from_byte_slice(source.data, None)
                .map_err(|e| {
                    ReadError::document_source_with("failed to load PDF document", e)
                })?;

            let page_count = document.pages().len() as usize;
            let limit = max_pages.map_or(page_count, |cap| cap.min(page_count));
            info!(pages = page_count, reading = limit, "extracting scans from PDF");

            for index in 0..limit {
                on_scan(scan_from_pdf_page(&document, index));
            }
            Ok(())
        }
        SourceKind::Jpeg | SourceKind::Png => {
            info!("extracting scan from raster source");
            on_scan(scan_from_raster(source.data));
            Ok(())
        }
    }
}

/// Extracts the dominant raster image from one PDF page.
///
/// # Errors
///
/// Returns [`ReadError::DocumentSource`] if the page index is out of
/// range or the page embeds no usable raster image.
pub fn scan_from_pdf_page(document: &PdfDocument<'_>, page_index: usize) -> ReadResult<ScanBuffer> {
    let page_count = document.pages().len() as usize;
    if page_index >= page_count {
        return Err(ReadError::document_source(format!(
            "page index {page_index} out of range for a {page_count}-page PDF"
        )));
    }

    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| ReadError::document_source_with("failed to open PDF page", e))?;

    // Walk the page's drawing objects and keep the image with the
    // largest pixel area; on a scanned bordereau that is the scan.
    let mut largest: Option<DynamicImage> = None;
    let mut largest_area = 0u64;

    for object in page.objects().iter() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };
        let Ok(decoded) = image_object.get_raw_image() else {
            continue;
        };
        let area = decoded.width() as u64 * decoded.height() as u64;
        if area > largest_area {
            largest_area = area;
            largest = Some(decoded);
        }
    }

    let decoded = largest.ok_or_else(|| {
        ReadError::document_source(format!(
            "no embeddable raster image found on PDF page {page_index}"
        ))
    })?;

    debug!(
        page = page_index,
        width = decoded.width(),
        height = decoded.height(),
        "selected dominant page image"
    );

    Ok(ScanBuffer::new(decoded, page_index, page_index == 0))
}

/// Reads a raster source (JPEG/PNG) directly.
fn scan_from_raster(data: &[u8]) -> ReadResult<ScanBuffer> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| ReadError::document_source_with("unreadable raster image", e))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ReadError::document_source(
            "raster image has no determinable dimensions",
        ));
    }
    Ok(ScanBuffer::new(decoded, 0, true))
}

/// Binds to the PDFium native library, preferring a copy next to the
/// executable over system-wide installs.
fn bind_pdfium() -> ReadResult<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib")))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/local/lib")))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ReadError::document_source_with("could not bind PDFium library", e))?;
    Ok(Pdfium::new(bindings))
}

/// Channel count of the decoded source data.
fn source_channels(decoded: &DynamicImage) -> u8 {
    match decoded {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => 1,
        DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgba32F(_) => 4,
        _ => 3,
    }
}

/// Expands bilevel grayscale data (all samples 0 or 1, as left by 1-bit
/// packed sources) to the full 8-bit range. Returns the image and
/// whether expansion happened.
fn expand_bilevel(decoded: DynamicImage) -> (DynamicImage, bool) {
    if let DynamicImage::ImageLuma8(mut gray) = decoded {
        if !gray.is_empty() && gray.iter().all(|&v| v <= 1) {
            for value in gray.iter_mut() {
                *value *= 255;
            }
            return (DynamicImage::ImageLuma8(gray), true);
        }
        return (DynamicImage::ImageLuma8(gray), false);
    }
    (decoded, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_source_kind_dispatch() {
        assert_eq!(SourceKind::from_mime("application/pdf").unwrap(), SourceKind::Pdf);
        assert_eq!(SourceKind::from_mime("image/jpeg").unwrap(), SourceKind::Jpeg);
        assert_eq!(SourceKind::from_mime("image/png").unwrap(), SourceKind::Png);
        assert!(matches!(
            SourceKind::from_mime("application/msword"),
            Err(ReadError::DocumentSource { .. })
        ));
    }

    #[test]
    fn test_bilevel_data_is_expanded() {
        let mut packed = GrayImage::new(4, 1);
        packed.put_pixel(0, 0, Luma([1]));
        packed.put_pixel(2, 0, Luma([1]));
        let scan = ScanBuffer::new(DynamicImage::ImageLuma8(packed), 0, true);
        assert!(scan.unpacked());
        assert_eq!(scan.channels(), 1);
        assert_eq!(scan.image().get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(scan.image().get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_full_range_grayscale_left_alone() {
        let gray = GrayImage::from_pixel(2, 2, Luma([200]));
        let scan = ScanBuffer::new(DynamicImage::ImageLuma8(gray), 3, false);
        assert!(!scan.unpacked());
        assert_eq!(scan.page_index(), 3);
        assert_eq!(scan.image().get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_raster_scan_reads_metadata() {
        let mut png_bytes = Vec::new();
        let img = RgbImage::from_pixel(8, 6, image::Rgb([255, 255, 255]));
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .unwrap();

        let mut scans = Vec::new();
        for_each_scan(
            DocumentSource {
                data: &png_bytes,
                kind: SourceKind::Png,
            },
            None,
            |scan| scans.push(scan.expect("valid raster page")),
        )
        .unwrap();

        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].width(), 8);
        assert_eq!(scans[0].height(), 6);
        assert_eq!(scans[0].channels(), 3);
        assert!(scans[0].debug());
    }

    #[test]
    fn test_garbage_raster_is_document_source_error() {
        let result = scan_from_raster(&[0x00, 0x01, 0x02]);
        assert!(matches!(result, Err(ReadError::DocumentSource { .. })));
    }

    #[test]
    fn test_unreadable_page_lands_in_its_slot() {
        // A bad page must reach the callback as an error, not abort the
        // extraction loop.
        let mut slots = Vec::new();
        let outcome = for_each_scan(
            DocumentSource {
                data: &[0xde, 0xad],
                kind: SourceKind::Png,
            },
            None,
            |scan| slots.push(scan),
        );
        assert!(outcome.is_ok());
        assert_eq!(slots.len(), 1);
        assert!(matches!(slots[0], Err(ReadError::DocumentSource { .. })));
    }
}
