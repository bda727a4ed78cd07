//! Optional diagnostic snapshot sink.
//!
//! Pipeline stages can publish intermediate rasters (the thresholded
//! detection mask, the rectified frame, region crops) keyed by stage
//! name and step number. Purely diagnostic: a sink never alters results,
//! and the default sink drops everything.

use image::DynamicImage;

/// Receiver for intermediate raster snapshots.
///
/// Implementations must tolerate being called from multiple stages of
/// the same page in order; `step` restarts at zero on every stage.
pub trait DebugSink: Send + Sync {
    fn snapshot(&self, stage: &str, step: u32, image: &DynamicImage);
}

/// Discards every snapshot. The default when no diagnostics are wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn snapshot(&self, _stage: &str, _step: u32, _image: &DynamicImage) {}
}
