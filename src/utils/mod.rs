//! Shared utilities for the reading pipeline.

pub mod geometry;

pub use geometry::{Point2f, perspective_transform, warp_perspective};
