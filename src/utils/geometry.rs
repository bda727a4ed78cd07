//! Projective-geometry helpers for scan rectification.
//!
//! This module provides the point-correspondence homography solve and the
//! inverse-mapped warp used to pull a distorted scan back onto the
//! document's theoretical layout. Sampling is bilinear and pixels mapped
//! from outside the source are filled with constant white, matching the
//! paper background.

use crate::core::{ReadError, ReadResult};
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

/// Background fill for destination pixels with no source counterpart.
const BORDER_WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2f {
    /// X coordinate of the point.
    pub x: f32,
    /// Y coordinate of the point.
    pub y: f32,
}

impl Point2f {
    /// Creates a new Point2f with the given coordinates.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Calculates the perspective transformation matrix mapping four source
/// points onto four destination points.
///
/// Solves the standard 8x8 linear system for the homography coefficients;
/// the ninth coefficient is fixed at 1.
///
/// # Errors
///
/// Returns [`ReadError::Realignment`] if either slice does not contain
/// exactly 4 points or the system is singular (degenerate correspondences).
pub fn perspective_transform(
    src_points: &[Point2f],
    dst_points: &[Point2f],
) -> ReadResult<Matrix3<f32>> {
    if src_points.len() != 4 || dst_points.len() != 4 {
        return Err(ReadError::realignment(format!(
            "homography needs exactly 4 correspondences, got {}",
            src_points.len().min(dst_points.len())
        )));
    }

    let mut a = nalgebra::DMatrix::<f32>::zeros(8, 8);
    let mut b = nalgebra::DVector::<f32>::zeros(8);

    for i in 0..4 {
        let src = &src_points[i];
        let dst = &dst_points[i];

        a.set_row(
            i * 2,
            &nalgebra::RowDVector::from_row_slice(&[
                src.x,
                src.y,
                1.0,
                0.0,
                0.0,
                0.0,
                -src.x * dst.x,
                -src.y * dst.x,
            ]),
        );
        b[i * 2] = dst.x;

        a.set_row(
            i * 2 + 1,
            &nalgebra::RowDVector::from_row_slice(&[
                0.0,
                0.0,
                0.0,
                src.x,
                src.y,
                1.0,
                -src.x * dst.y,
                -src.y * dst.y,
            ]),
        );
        b[i * 2 + 1] = dst.y;
    }

    let decomp = a.lu();
    let solution = decomp
        .solve(&b)
        .ok_or_else(|| ReadError::realignment("degenerate anchor correspondences"))?;

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}

/// Applies a perspective transformation to an image.
///
/// Uses inverse mapping: for each destination pixel the matrix inverse
/// locates the source coordinate, which is sampled bilinearly. Rows are
/// processed in parallel.
///
/// # Errors
///
/// Returns [`ReadError::Realignment`] if either destination dimension is
/// zero or the transformation matrix cannot be inverted.
pub fn warp_perspective(
    src_image: &RgbImage,
    transform: &Matrix3<f32>,
    dst_width: u32,
    dst_height: u32,
) -> ReadResult<RgbImage> {
    if dst_width == 0 || dst_height == 0 {
        return Err(ReadError::realignment(format!(
            "degenerate warp destination ({dst_width}x{dst_height})"
        )));
    }

    let inv_matrix = transform
        .try_inverse()
        .ok_or_else(|| ReadError::realignment("perspective matrix is not invertible"))?;

    let mut dst_image = RgbImage::new(dst_width, dst_height);
    let buffer: &mut [u8] = dst_image.as_mut();

    buffer
        .par_chunks_mut((dst_width * 3) as usize)
        .enumerate()
        .for_each(|(dst_y, row_buffer)| {
            for dst_x in 0..dst_width {
                let dst_point = Vector3::new(dst_x as f32, dst_y as f32, 1.0);
                let src_point = inv_matrix * dst_point;
                let pixel = if src_point.z.abs() > f32::EPSILON {
                    let src_x = src_point.x / src_point.z;
                    let src_y = src_point.y / src_point.z;
                    bilinear_sample(src_image, src_x, src_y)
                } else {
                    BORDER_WHITE
                };
                let index = (dst_x * 3) as usize;
                row_buffer[index..index + 3].copy_from_slice(&pixel.0);
            }
        });

    Ok(dst_image)
}

/// Samples the image at a fractional coordinate with bilinear
/// interpolation. Coordinates outside the image yield constant white.
fn bilinear_sample(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let x_int = x.floor() as i32;
    let y_int = y.floor() as i32;

    if x_int < -1 || y_int < -1 || x_int >= width || y_int >= height {
        return BORDER_WHITE;
    }

    let dx = x - x_int as f32;
    let dy = y - y_int as f32;

    let sample = |sx: i32, sy: i32| -> Rgb<u8> {
        if sx < 0 || sy < 0 || sx >= width || sy >= height {
            BORDER_WHITE
        } else {
            *image.get_pixel(sx as u32, sy as u32)
        }
    };

    let p11 = sample(x_int, y_int);
    let p21 = sample(x_int + 1, y_int);
    let p12 = sample(x_int, y_int + 1);
    let p22 = sample(x_int + 1, y_int + 1);

    let mut result = [0u8; 3];
    for (channel, out) in result.iter_mut().enumerate() {
        let value = (1.0 - dx) * (1.0 - dy) * p11.0[channel] as f32
            + dx * (1.0 - dy) * p21.0[channel] as f32
            + (1.0 - dx) * dy * p12.0[channel] as f32
            + dx * dy * p22.0[channel] as f32;
        *out = value.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> [Point2f; 4] {
        [
            Point2f::new(0.0, 0.0),
            Point2f::new(1.0, 0.0),
            Point2f::new(1.0, 1.0),
            Point2f::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_perspective_transform_identity() {
        let pts = unit_square();
        let transform = perspective_transform(&pts, &pts).unwrap();
        for (actual, expected) in transform.iter().zip(Matrix3::<f32>::identity().iter()) {
            assert!((actual - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_perspective_transform_rejects_wrong_count() {
        let three = &unit_square()[..3];
        let result = perspective_transform(three, &unit_square());
        assert!(matches!(result, Err(ReadError::Realignment { .. })));
    }

    #[test]
    fn test_warp_marker_lands_within_one_pixel() {
        // Black marker at (20, 30) in a white 100x100 image; a known
        // synthetic transform (scale x2 + translate) must map it to
        // within +/-1 px of its theoretical position (60, 80).
        let mut src = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        src.put_pixel(20, 30, Rgb([0, 0, 0]));

        let src_pts = [
            Point2f::new(0.0, 0.0),
            Point2f::new(100.0, 0.0),
            Point2f::new(100.0, 100.0),
            Point2f::new(0.0, 100.0),
        ];
        let dst_pts = [
            Point2f::new(20.0, 20.0),
            Point2f::new(220.0, 20.0),
            Point2f::new(220.0, 220.0),
            Point2f::new(20.0, 220.0),
        ];

        let transform = perspective_transform(&src_pts, &dst_pts).unwrap();
        let warped = warp_perspective(&src, &transform, 240, 240).unwrap();

        let mut darkest = (0u32, 0u32, 255u8);
        for (x, y, pixel) in warped.enumerate_pixels() {
            if pixel.0[0] < darkest.2 {
                darkest = (x, y, pixel.0[0]);
            }
        }
        let (x, y, _) = darkest;
        assert!((x as i32 - 60).abs() <= 1, "marker x at {x}");
        assert!((y as i32 - 80).abs() <= 1, "marker y at {y}");
    }

    #[test]
    fn test_warp_fills_outside_with_white() {
        let src = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        // Shrink the source into the top-left quadrant; the rest of the
        // destination has no source pixel and must come out white.
        let src_pts = [
            Point2f::new(0.0, 0.0),
            Point2f::new(10.0, 0.0),
            Point2f::new(10.0, 10.0),
            Point2f::new(0.0, 10.0),
        ];
        let dst_pts = [
            Point2f::new(0.0, 0.0),
            Point2f::new(5.0, 0.0),
            Point2f::new(5.0, 5.0),
            Point2f::new(0.0, 5.0),
        ];
        let transform = perspective_transform(&src_pts, &dst_pts).unwrap();
        let warped = warp_perspective(&src, &transform, 20, 20).unwrap();
        assert_eq!(*warped.get_pixel(15, 15), Rgb([255, 255, 255]));
        assert_eq!(*warped.get_pixel(2, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_warp_rejects_zero_destination() {
        let image = RgbImage::new(4, 4);
        let identity = Matrix3::identity();
        assert!(matches!(
            warp_perspective(&image, &identity, 0, 10),
            Err(ReadError::Realignment { .. })
        ));
        assert!(matches!(
            warp_perspective(&image, &identity, 10, 0),
            Err(ReadError::Realignment { .. })
        ));
    }

    #[test]
    fn test_warp_rejects_singular_matrix() {
        let image = RgbImage::new(2, 2);
        let singular = Matrix3::new(1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(warp_perspective(&image, &singular, 2, 2).is_err());
    }
}
