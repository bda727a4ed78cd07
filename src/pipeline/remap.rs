//! Re-expresses anchor detections under an applied rotation.
//!
//! After the scan is rotated upright, every detection's pixel center and
//! corner role must follow. Each 90-degree step has a closed-form
//! per-quadrant transform; anything that is not a multiple of 90 is an
//! alignment error.

use crate::core::{ReadError, ReadResult};
use crate::pipeline::detect::{AnchorDetection, Corner};
use crate::pipeline::orient::Rotation;

/// Corner role cycles per rotation: entry `c` is the corner a detection
/// assigned to corner `c` moves to.
const CORNER_CYCLE_90: [usize; 4] = [1, 3, 0, 2];
const CORNER_CYCLE_180: [usize; 4] = [3, 2, 1, 0];
const CORNER_CYCLE_270: [usize; 4] = [2, 0, 3, 1];

/// Remaps detections for a rotation given in degrees.
///
/// # Errors
///
/// Returns [`ReadError::Alignment`] unless `degrees` is a multiple of 90.
pub fn remap_detections_degrees(
    detections: &[Option<AnchorDetection>; 4],
    degrees: i32,
    width: u32,
    height: u32,
) -> ReadResult<[Option<AnchorDetection>; 4]> {
    if degrees % 90 != 0 {
        return Err(ReadError::alignment(format!(
            "rotation must be a multiple of 90 degrees to remap detections, got {degrees}"
        )));
    }
    // A multiple of 90 always normalizes into the enum.
    let rotation = Rotation::from_degrees(degrees)
        .ok_or_else(|| ReadError::alignment("unsupported rotation for detection remapping"))?;
    Ok(remap_detections(detections, rotation, width, height))
}

/// Remaps each detection's pixel center and corner role under `rotation`.
///
/// `width` and `height` are the pre-rotation image dimensions. `R0` is
/// the identity.
pub fn remap_detections(
    detections: &[Option<AnchorDetection>; 4],
    rotation: Rotation,
    width: u32,
    height: u32,
) -> [Option<AnchorDetection>; 4] {
    if rotation == Rotation::R0 {
        return detections.clone();
    }

    let (w, h) = (width as f32, height as f32);
    let cycle = match rotation {
        Rotation::R0 => &[0, 1, 2, 3],
        Rotation::R90 => &CORNER_CYCLE_90,
        Rotation::R180 => &CORNER_CYCLE_180,
        Rotation::R270 => &CORNER_CYCLE_270,
    };

    let mut remapped: [Option<AnchorDetection>; 4] = [None, None, None, None];
    for detection in detections.iter().flatten() {
        let (x, y) = detection.center;
        let center = match rotation {
            Rotation::R0 => (x, y),
            Rotation::R90 => (h - y, x),
            Rotation::R180 => (w - x, h - y),
            Rotation::R270 => (y, w - x),
        };
        let corner = Corner::from_index(cycle[detection.corner.index()]);
        remapped[corner.index()] = Some(AnchorDetection {
            center,
            corner,
            ..*detection
        });
    }

    remapped
}
