//! Core building blocks of the bordereau reader: configuration,
//! error types and the named tuning constants shared across stages.

pub mod config;
pub mod constants;
pub mod errors;

pub use config::{ModelRegion, PageFormat, ReaderConfig, RecognizerConfig, TemplateGeometry};
pub use errors::{ReadError, ReadResult};
