//! Document orientation from target ring-count identities.
//!
//! Each 90-degree rotation of the page permutes which ring count sits at
//! which corner. The resolver walks the corners in a fixed reliability
//! order and accepts a rotation hypothesis once two anchors agree on it
//! (2-of-N consensus, not a full four-way vote). The vote is
//! deterministic; no randomness is involved.

use crate::core::constants::{
    CORNER_RELIABILITY_ORDER, CORNER_RING_COUNTS, ORIENTATION_CONSENSUS,
};
use crate::pipeline::detect::AnchorDetection;
use tracing::debug;

/// A page rotation in multiples of 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Upright.
    R0,
    /// Rotated 90 degrees.
    R90,
    /// Rotated 180 degrees.
    R180,
    /// Rotated 270 degrees.
    R270,
}

impl Rotation {
    /// All rotations in vote order.
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// The rotation angle in degrees.
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Parses an angle in degrees; `None` unless it is a multiple of 90
    /// (mod 360).
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }
}

/// Corner permutation applied by each rotation: entry `c` of row `r` is
/// the upright corner whose target appears at corner `c` after rotating
/// by `r * 90` degrees.
const ORIENTATION_PERMUTATIONS: [[usize; 4]; 4] = [
    [0, 1, 2, 3], // 0 degrees
    [1, 3, 0, 2], // 90 degrees
    [3, 2, 1, 0], // 180 degrees
    [2, 0, 3, 1], // 270 degrees
];

/// Ring count expected at `corner` when the page is rotated by `rotation`.
pub(crate) fn expected_rings(rotation: usize, corner: usize) -> u32 {
    CORNER_RING_COUNTS[ORIENTATION_PERMUTATIONS[rotation][corner]]
}

/// A provider of page orientation.
///
/// The primary implementation votes on ring-target identities; a
/// secondary fiducial scheme (e.g. printed tag decoding) can slot in as
/// a fallback when the targets are unreadable.
pub trait OrientationSource {
    /// Resolves the page rotation, or `None` when indeterminate.
    fn resolve(&self, detections: &[AnchorDetection]) -> Option<Rotation>;
}

/// Reliability-ordered consensus vote over ring-target identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct RingTargetOrientation;

impl OrientationSource for RingTargetOrientation {
    fn resolve(&self, detections: &[AnchorDetection]) -> Option<Rotation> {
        resolve_orientation(detections)
    }
}

/// Determines the page rotation from anchor detections.
///
/// Duplicate corner assignments (two candidates claiming the same
/// corner) indicate a misread; only the candidate nearest its edge is
/// kept. Corners then vote in [`CORNER_RELIABILITY_ORDER`]; a rotation
/// is accepted once [`ORIENTATION_CONSENSUS`] anchors in a row agree.
///
/// Returns `None` when no rotation reaches consensus; the caller falls
/// back to a secondary [`OrientationSource`].
pub fn resolve_orientation(detections: &[AnchorDetection]) -> Option<Rotation> {
    let mut unique: [Option<&AnchorDetection>; 4] = [None, None, None, None];
    for detection in detections {
        let slot = &mut unique[detection.corner.index()];
        match slot {
            Some(current) if current.edge_distance <= detection.edge_distance => {}
            _ => *slot = Some(detection),
        }
    }

    let mut hypothesis: Option<usize> = None;
    let mut agreeing = 0usize;

    for &corner in &CORNER_RELIABILITY_ORDER {
        let Some(detection) = unique[corner] else {
            continue;
        };

        for (rotation, variant) in Rotation::ALL.iter().enumerate() {
            if expected_rings(rotation, corner) != detection.ring_count {
                continue;
            }
            if hypothesis == Some(rotation) {
                agreeing += 1;
                if agreeing >= ORIENTATION_CONSENSUS {
                    debug!(rotation = variant.degrees(), "orientation consensus reached");
                    return Some(*variant);
                }
            } else {
                hypothesis = Some(rotation);
                agreeing = 1;
            }
        }
    }

    debug!("orientation indeterminate, no rotation reached consensus");
    None
}
