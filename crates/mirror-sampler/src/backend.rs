//! Compute backend capability interface
//!
//! A backend runs the mirrored-repeat mapping over every destination pixel and
//! hands the result back to the host. The verification harness only talks to
//! this trait, so GPU and software backends can be swapped without touching
//! the comparison logic.

use crate::image::{ImageError, Offset, ScalarImage};
use crate::reference::mirrored_sample;

/// Executes the mirrored-repeat mapping `(source, dst_dims, offset) -> destination`
pub trait ComputeBackend {
    /// Fatal error raised when the backend cannot produce a result
    type Error: std::error::Error + Send + Sync + 'static;

    /// Human-readable backend name used in reports
    fn name(&self) -> &str;

    /// Runs the mapping and blocks until the result is readable on the host
    ///
    /// # Arguments
    /// * `source` - Read-only source image
    /// * `dst_dims` - `(width, height)` of the destination grid
    /// * `offset` - Shift subtracted from every destination coordinate before mirroring
    ///
    /// # Returns
    /// The destination image written by the backend
    fn run_mapping(&mut self, source: &ScalarImage, dst_dims: (u32, u32), offset: Offset) -> Result<ScalarImage, Self::Error>;
}

/// Software backend that evaluates the per-pixel mapping on the host
///
/// Each destination row is produced independently from the shared read-only
/// source, the same data-parallel shape a GPU dispatch has.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    type Error = ImageError;

    fn name(&self) -> &str {
        "CPU Software Backend"
    }

    fn run_mapping(&mut self, source: &ScalarImage, dst_dims: (u32, u32), offset: Offset) -> Result<ScalarImage, Self::Error> {
        let (dst_width, dst_height) = dst_dims;
        if dst_width == 0 || dst_height == 0 {
            return Err(ImageError::ZeroExtent { width: dst_width, height: dst_height });
        }
        tracing::debug!("CPU backend mapping {}x{} -> {dst_width}x{dst_height}", source.width(), source.height());

        let mut data = vec![0.0f32; dst_width as usize * dst_height as usize];
        for (y_out, row) in data.chunks_mut(dst_width as usize).enumerate() {
            for (x_out, pixel) in row.iter_mut().enumerate() {
                *pixel = mirrored_sample(source, x_out as u32, y_out as u32, offset);
            }
        }

        ScalarImage::new(dst_width, dst_height, data)
    }
}
