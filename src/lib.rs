//! Bordereau reader: recovers handwritten anonymity codes from scanned
//! exam cover sheets.
//!
//! A scanned bordereau carries four printed concentric-ring calibration
//! targets, one per corner, each with a distinct ring count. The reader
//! locates them by contour-hierarchy analysis, votes on the page's
//! rotation from the ring identities, warps the scan onto the document's
//! theoretical layout with a four-point homography, slices out each
//! handwritten character cell, and reads every cell twice (Tesseract in
//! single-character mode plus an EMNIST letter classifier). A stride
//! based redundancy audit flags pages where every printed copy of some
//! character failed.
//!
//! # Example
//!
//! ```no_run
//! use bordereau_reader::core::{ModelRegion, ReaderConfig};
//! use bordereau_reader::pipeline::{BordereauReader, DocumentSource, SourceKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("bordereau.pdf")?;
//! let regions: Vec<ModelRegion> = serde_json::from_str(&std::fs::read_to_string("layout.json")?)?;
//!
//! let reader = BordereauReader::new(ReaderConfig::default());
//! let source = DocumentSource { data: &bytes, kind: SourceKind::Pdf };
//! for page in reader.read_document(source, &regions)? {
//!     match page {
//!         Ok(readout) => println!("page {}: {:?}", readout.page_index, readout.failed_indices),
//!         Err(error) => eprintln!("{error}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod pipeline;
pub mod recognition;
pub mod utils;

pub use core::{ReadError, ReadResult, ReaderConfig};
pub use pipeline::{BordereauReader, DocumentSource, SourceKind};
pub use recognition::{PageReadout, RecognitionResult};
