//! Dual-recognizer ensemble and redundancy audit.
//!
//! Every region crop is read twice, by Tesseract in single-character
//! mode and by an EMNIST letter classifier. The ensemble reports both
//! verdicts with their confidences and deliberately applies no policy of
//! its own; which answer wins, or what counts as a failed cell, is the
//! caller's call. Engine-level breakage (missing weights, a Tesseract
//! worker that will not start) aborts the page; a cell that simply reads
//! badly does not.

pub mod audit;
pub mod classifier;
pub mod ocr;

pub use audit::{is_unrecoverable, is_unrecoverable_default};
pub use classifier::{ClassifierEngine, ClassifierReading};
pub use ocr::{OcrReading, recognize_char};

use crate::core::{ReadResult, RecognizerConfig};
use crate::pipeline::extract::ExtractedRegion;
use serde::Serialize;
use tracing::debug;

/// Both recognizers' verdicts for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    /// Trimmed Tesseract output; empty when nothing was read.
    pub ocr_text: String,
    /// Tesseract mean text confidence in [0, 1].
    pub ocr_confidence: f32,
    /// Classifier argmax letter.
    pub classifier_char: char,
    /// Classifier softmax probability in [0, 1].
    pub classifier_confidence: f32,
}

impl RecognitionResult {
    /// The character both recognizers agree on, if any. One convenient
    /// verdict policy; callers are free to apply their own.
    pub fn consensus(&self) -> Option<char> {
        let mut chars = self.ocr_text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c == self.classifier_char => Some(c),
            _ => None,
        }
    }
}

/// One page's durable output: every region's verdicts in extraction
/// order, the indices the caller deemed unreadable, and the audit flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReadout {
    /// Zero-based page index within the source document.
    pub page_index: usize,
    /// One entry per region, same order as the layout's region list.
    pub results: Vec<RecognitionResult>,
    /// Region indices considered failed under the caller's policy.
    pub failed_indices: Vec<usize>,
    /// True when the failures wipe out every copy of some character.
    pub unrecoverable: bool,
}

impl PageReadout {
    /// Assembles a readout, running the redundancy audit over
    /// `failed_indices` with the given stride.
    pub fn assemble(
        page_index: usize,
        results: Vec<RecognitionResult>,
        failed_indices: Vec<usize>,
        stride: usize,
    ) -> PageReadout {
        let unrecoverable = audit::is_unrecoverable(&failed_indices, stride);
        PageReadout {
            page_index,
            results,
            failed_indices,
            unrecoverable,
        }
    }
}

/// Runs both recognizers over every region, in order.
///
/// # Errors
///
/// Returns [`ReadError::Recognition`](crate::core::ReadError::Recognition)
/// on engine-level failure; the page yields no partial readout.
pub fn recognize_regions(
    regions: &[ExtractedRegion],
    config: &RecognizerConfig,
) -> ReadResult<Vec<RecognitionResult>> {
    let engine = ClassifierEngine::shared(&config.classifier_model)?;

    let mut results = Vec::with_capacity(regions.len());
    for (index, region) in regions.iter().enumerate() {
        let ocr = recognize_char(&region.image, config)?;
        let classified = engine.classify(&region.image)?;

        debug!(
            index,
            ocr = %ocr.text,
            classifier = %classified.character,
            "region recognized"
        );

        results.push(RecognitionResult {
            ocr_text: ocr.text,
            ocr_confidence: ocr.confidence,
            classifier_char: classified.character,
            classifier_confidence: classified.confidence,
        });
    }
    Ok(results)
}
