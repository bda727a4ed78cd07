//! Single-character OCR over Tesseract.
//!
//! The engine runs in single-character page segmentation mode with a
//! restricted alphabet and both dictionaries disabled; a handwritten
//! anonymity-code cell carries no linguistic context for a dictionary to
//! help with. The native worker is expensive to spin up, so one shared
//! instance is built lazily for the whole process and reused across
//! pages; concurrent first use cannot double-initialize.

use crate::core::{ReadError, ReadResult, RecognizerConfig};
use image::{GrayImage, RgbImage};
use imageproc::contrast::{ThresholdType, stretch_contrast, threshold};
use imageproc::filter::median_filter;
use leptess::{LepTess, Variable};
use once_cell::sync::OnceCell;
use std::sync::Mutex;
use tracing::debug;

/// Gamma exponent for the OCR preprocess chain.
const OCR_GAMMA: f32 = 1.4;

/// Global binarization threshold applied after normalization.
const OCR_THRESHOLD: u8 = 190;

/// Single-character page segmentation mode (Tesseract PSM 10).
const PSM_SINGLE_CHAR: &str = "10";

static SHARED_ENGINE: OnceCell<Mutex<LepTess>> = OnceCell::new();

/// Text and confidence returned by the OCR path for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrReading {
    /// Recognized text, trimmed. Empty when nothing was read.
    pub text: String,
    /// Mean word confidence in [0, 1].
    pub confidence: f32,
}

/// Prepares a region crop for single-character OCR: grayscale, contrast
/// normalization, gamma correction, a small median pass and a hard
/// threshold onto white paper.
pub fn preprocess_for_ocr(region: &RgbImage) -> GrayImage {
    let gray = image::imageops::grayscale(region);

    let (mut low, mut high) = (u8::MAX, u8::MIN);
    for pixel in gray.pixels() {
        low = low.min(pixel.0[0]);
        high = high.max(pixel.0[0]);
    }
    let stretched = if low < high {
        stretch_contrast(&gray, low, high, 0, 255)
    } else {
        gray
    };

    let corrected = gamma_correct(&stretched, OCR_GAMMA);
    let smoothed = median_filter(&corrected, 1, 1);
    threshold(&smoothed, OCR_THRESHOLD, ThresholdType::Binary)
}

/// Applies `out = 255 * (in / 255)^gamma` via a lookup table.
fn gamma_correct(gray: &GrayImage, gamma: f32) -> GrayImage {
    let mut lut = [0u8; 256];
    for (value, entry) in lut.iter_mut().enumerate() {
        *entry = (255.0 * (value as f32 / 255.0).powf(gamma)).round() as u8;
    }
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    out
}

/// Runs single-character OCR on a preprocessed region.
///
/// # Errors
///
/// Returns [`ReadError::Recognition`] when the Tesseract worker cannot
/// be initialized or fed; engine-level failures are page-fatal.
pub fn recognize_char(region: &RgbImage, config: &RecognizerConfig) -> ReadResult<OcrReading> {
    let prepared = preprocess_for_ocr(region);

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(prepared)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ReadError::recognition_with("failed to encode region for OCR", e))?;

    let engine = shared_engine(config)?;
    let mut worker = engine
        .lock()
        .map_err(|_| ReadError::recognition("OCR worker mutex poisoned"))?;

    worker
        .set_image_from_mem(&png)
        .map_err(|e| ReadError::recognition_with("failed to load region into OCR worker", e))?;
    worker.set_source_resolution(300);

    let text = worker
        .get_utf8_text()
        .map_err(|e| ReadError::recognition_with("OCR recognition failed", e))?
        .trim()
        .to_string();
    let confidence = (worker.mean_text_conf().max(0) as f32) / 100.0;

    debug!(%text, confidence, "ocr verdict");
    Ok(OcrReading { text, confidence })
}

/// Returns the process-wide OCR worker, initializing it on first use.
fn shared_engine(config: &RecognizerConfig) -> ReadResult<&'static Mutex<LepTess>> {
    SHARED_ENGINE.get_or_try_init(|| {
        let mut worker = LepTess::new(None, &config.ocr_language).map_err(|e| {
            ReadError::recognition_with(
                format!("failed to initialize Tesseract ({})", config.ocr_language),
                e,
            )
        })?;

        let set = |worker: &mut LepTess, variable: Variable, value: &str| {
            worker.set_variable(variable, value).map_err(|e| {
                ReadError::recognition_with(format!("failed to set OCR variable {variable:?}"), e)
            })
        };

        // Single character per cell, restricted alphabet, no dictionaries.
        set(&mut worker, Variable::TesseditPagesegMode, PSM_SINGLE_CHAR)?;
        set(&mut worker, Variable::TesseditCharWhitelist, &config.alphabet)?;
        set(&mut worker, Variable::LoadSystemDawg, "0")?;
        set(&mut worker, Variable::LoadFreqDawg, "0")?;

        Ok(Mutex::new(worker))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_preprocess_binarizes_to_two_levels() {
        let mut region = RgbImage::from_pixel(32, 32, Rgb([230, 230, 230]));
        for y in 8..24 {
            for x in 14..18 {
                region.put_pixel(x, y, Rgb([40, 40, 40]));
            }
        }
        let prepared = preprocess_for_ocr(&region);
        assert!(prepared.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        // Ink must stay dark, paper white.
        assert_eq!(prepared.get_pixel(16, 16).0[0], 0);
        assert_eq!(prepared.get_pixel(2, 2).0[0], 255);
    }

    #[test]
    fn test_preprocess_handles_flat_region() {
        let flat = RgbImage::from_pixel(8, 8, Rgb([128, 128, 128]));
        // A crop with no contrast at all must not panic or divide by zero.
        let prepared = preprocess_for_ocr(&flat);
        assert_eq!(prepared.dimensions(), (8, 8));
    }

    #[test]
    fn test_gamma_lut_endpoints_fixed() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([match x {
            0 => 0,
            1 => 128,
            _ => 255,
        }]));
        let corrected = gamma_correct(&gray, OCR_GAMMA);
        assert_eq!(corrected.get_pixel(0, 0).0[0], 0);
        assert_eq!(corrected.get_pixel(2, 0).0[0], 255);
        // Gamma > 1 darkens midtones.
        assert!(corrected.get_pixel(1, 0).0[0] < 128);
    }
}
