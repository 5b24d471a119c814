//! Host reference evaluator
//!
//! Computes the buffer a mirrored-repeat sampling kernel is expected to write,
//! independently of any compute backend.

use crate::address::mirrored_source_coords;
use crate::image::{ImageError, Offset, ScalarImage};

/// Samples `source` with mirrored-repeat addressing into a `dst_width` x `dst_height` image
///
/// Destination pixel `(x, y)` receives the source pixel at
/// `mirrored_source_coords(x, y, offset, source.dimensions())`.
///
/// # Errors
/// Returns [`ImageError::ZeroExtent`] if either destination extent is zero.
pub fn reference_mirrored_repeat(source: &ScalarImage, dst_width: u32, dst_height: u32, offset: Offset) -> Result<ScalarImage, ImageError> {
    let mut data = Vec::with_capacity(dst_width as usize * dst_height as usize);
    for y_out in 0..dst_height {
        for x_out in 0..dst_width {
            data.push(mirrored_sample(source, x_out, y_out, offset));
        }
    }

    ScalarImage::new(dst_width, dst_height, data)
}

/// Reads the source value that destination pixel `(dst_x, dst_y)` receives
///
/// Panics if the mirrored coordinate falls outside `source`, which would mean
/// the addressing arithmetic is broken.
pub(crate) fn mirrored_sample(source: &ScalarImage, dst_x: u32, dst_y: u32, offset: Offset) -> f32 {
    let (x_src, y_src) = mirrored_source_coords(dst_x, dst_y, offset, source.dimensions());
    source.as_slice()[y_src as usize * source.width() as usize + x_src as usize]
}
