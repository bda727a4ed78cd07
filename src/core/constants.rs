//! Named tuning constants for the reading pipeline.
//!
//! Detection thresholds, the orientation vote parameters and the
//! redundancy stride are empirically tuned values inherited from the
//! printed template design. They are collected here so a template
//! revision changes one place.

/// Ring count printed at each corner target, indexed by
/// [`Corner`](crate::pipeline::detect::Corner) (TL, TR, BL, BR).
///
/// The nested-ring count is the target's identity: it survives blur,
/// moderate rotation and partial occlusion better than any printed glyph.
pub const CORNER_RING_COUNTS: [u32; 4] = [4, 2, 3, 1];

/// Corners ordered from most to least reliable for the orientation vote.
///
/// The bottom-right target sits farthest from the staple/feed edge and
/// is the least likely to be cut or smeared, so it votes first. The
/// bottom-left target never votes; the tuned order was calibrated
/// without it and widening the vote would change acceptance on
/// degraded scans.
pub const CORNER_RELIABILITY_ORDER: [usize; 3] = [3, 1, 0];

/// Number of agreeing anchors required to accept a rotation hypothesis.
///
/// The template authors settled on 2-of-N without recording why; the
/// value is preserved as-is rather than tightened to 3.
pub const ORIENTATION_CONSENSUS: usize = 2;

/// Index offset between physically duplicated copies of the same
/// character cell on the default 6-cell benchmark layout.
pub const DEFAULT_REDUNDANCY_STRIDE: usize = 3;

/// Gaussian blur sigma approximating the 5x5 kernel used when the
/// template was calibrated.
pub const DETECT_BLUR_SIGMA: f32 = 1.1;

/// Adaptive threshold block size in pixels (odd).
pub const DETECT_THRESHOLD_BLOCK: u32 = 41;

/// Adaptive threshold bias subtracted from the block mean.
pub const DETECT_THRESHOLD_BIAS: i16 = 5;

/// Accepted enclosing-circle radius range relative to the expected
/// target radius.
pub const DETECT_RADIUS_TOLERANCE: (f32, f32) = (0.8, 1.2);

/// Minimum circularity (`4*pi*area / perimeter^2`) for a target candidate.
pub const DETECT_MIN_CIRCULARITY: f32 = 0.40;

/// Classifier input edge length in pixels (EMNIST).
pub const CLASSIFIER_INPUT_SIZE: u32 = 28;

/// Number of classifier output classes ('A'..='Z').
pub const CLASSIFIER_NUM_CLASSES: usize = 26;

/// Default symmetric region padding in millimeters. Slightly negative so
/// crops back away from the printed cell borders instead of including them.
pub const DEFAULT_REGION_PADDING_MM: f32 = -0.05;

/// Millimeters per document point (points are 72 per inch).
pub const MM_PER_POINT: f32 = 25.4 / 72.0;
