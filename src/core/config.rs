//! Configuration types for the reading pipeline.
//!
//! The template geometry (page format, target diameter and margin) must
//! match the values used when the printed template was generated; a
//! mismatch silently shifts every extracted region. Everything here is
//! `serde`-derivable so the layout collaborator can hand configuration
//! over as JSON.

use crate::core::constants::DEFAULT_REGION_PADDING_MM;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Physical page formats the printed template supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PageFormat {
    /// ISO A4, 210 x 297 mm.
    #[default]
    A4,
}

impl PageFormat {
    /// Returns the page dimensions in millimeters as (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            PageFormat::A4 => (210.0, 297.0),
        }
    }

    /// Width / height ratio of the page.
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.dimensions_mm();
        w / h
    }
}

/// Geometry of the printed template, as configured at generation time.
///
/// The reader derives the expected target radius and every theoretical
/// anchor position from these values, so they must match the generator's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemplateGeometry {
    /// Page format of the template.
    pub format: PageFormat,
    /// Diameter of a concentric-ring target in millimeters.
    pub target_diameter_mm: f32,
    /// Margin between the page edge and a target in millimeters.
    pub target_margin_mm: f32,
}

impl Default for TemplateGeometry {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            target_diameter_mm: 10.0,
            target_margin_mm: 10.0,
        }
    }
}

impl TemplateGeometry {
    /// Distance in millimeters from a page edge to the center of the
    /// nearest target. The usable reading area starts here on all sides.
    pub fn edge_to_target_center_mm(&self) -> f32 {
        self.target_margin_mm + self.target_diameter_mm / 2.0
    }
}

/// A named rectangle in document-point coordinates (72 points per inch),
/// supplied by the external layout collaborator. Independent of any scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRegion {
    /// Logical name of the region group this rectangle belongs to.
    pub name: String,
    /// Left edge in document points.
    pub x: f32,
    /// Top edge in document points.
    pub y: f32,
    /// Width in document points.
    pub width: f32,
    /// Height in document points.
    pub height: f32,
}

/// Settings for the two recognition engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Path to the EMNIST letter classifier in ONNX format.
    pub classifier_model: PathBuf,
    /// Tesseract language pack to load.
    pub ocr_language: String,
    /// Characters the OCR engine is allowed to emit.
    pub alphabet: String,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            classifier_model: PathBuf::from("resources/models/emnist/model.onnx"),
            ocr_language: "eng".to_string(),
            alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string(),
        }
    }
}

/// Top-level configuration for a reading run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Template geometry, matching generation-time values.
    pub geometry: TemplateGeometry,
    /// Recognition engine settings.
    pub recognizer: RecognizerConfig,
    /// Symmetric padding applied around each extracted region, in mm.
    pub region_padding_mm: f32,
    /// Maximum number of PDF pages to read; `None` reads them all.
    pub max_pages: Option<usize>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            geometry: TemplateGeometry::default(),
            recognizer: RecognizerConfig::default(),
            region_padding_mm: DEFAULT_REGION_PADDING_MM,
            max_pages: None,
        }
    }
}
