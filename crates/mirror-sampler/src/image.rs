//! Scalar image buffers and sampling offsets
//!
//! Every buffer exchanged between the reference evaluator, a compute backend
//! and the comparison step is a single-channel `f32` grid stored row-major.

use thiserror::Error;

/// Errors raised when constructing a [`ScalarImage`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Width or height was zero
    #[error("image extent must be non-zero, got {width}x{height}")]
    ZeroExtent { width: u32, height: u32 },
    /// The data length does not equal `width * height`
    #[error("image of {width}x{height} cannot hold {len} values")]
    LengthMismatch { width: u32, height: u32, len: usize },
}

/// A 2D grid of single-precision scalars stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarImage {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ScalarImage {
    /// Wraps row-major data as an image
    ///
    /// # Arguments
    /// * `width` - Number of columns
    /// * `height` - Number of rows
    /// * `data` - Row-major values, exactly `width * height` of them
    ///
    /// # Returns
    /// The image, or an error if an extent is zero or the length is wrong
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::ZeroExtent { width, height });
        }
        if data.len() != width as usize * height as usize {
            return Err(ImageError::LengthMismatch { width, height, len: data.len() });
        }
        Ok(Self { width, height, data })
    }

    /// Creates an image with every pixel set to `value`
    pub fn filled(width: u32, height: u32, value: f32) -> Result<Self, ImageError> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    /// Creates an image whose element `i` (row-major) holds `i` as a float
    ///
    /// Every pixel is distinguishable, so a mismatch points straight at the
    /// source pixel a kernel actually read.
    pub fn index_ramp(width: u32, height: u32) -> Result<Self, ImageError> {
        let len = width as usize * height as usize;
        Self::new(width, height, (0..len).map(|i| i as f32).collect())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the grid
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Converts a flat row-major index into `(x, y)`
    pub fn index_to_coords(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }

    /// Iterates over the rows of the image
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.width as usize)
    }
}

/// Integer shift subtracted from every output coordinate before mirroring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset {
    pub x: u32,
    pub y: u32,
}

impl Offset {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for Offset {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = ScalarImage::new(4, 5, vec![0.0; 19]).unwrap_err();
        assert_eq!(err, ImageError::LengthMismatch { width: 4, height: 5, len: 19 });
        assert_eq!(err.to_string(), "image of 4x5 cannot hold 19 values");
    }

    #[test]
    fn test_new_rejects_zero_extent() {
        assert_eq!(ScalarImage::new(0, 3, Vec::new()), Err(ImageError::ZeroExtent { width: 0, height: 3 }));
        assert!(ScalarImage::filled(3, 0, 1.0).is_err());
    }

    #[test]
    fn test_index_ramp_is_row_major() {
        let image = ScalarImage::index_ramp(4, 5).unwrap();

        assert_eq!(image.as_slice().len(), 20);
        assert_eq!(image.get(0, 0), Some(0.0));
        assert_eq!(image.get(3, 0), Some(3.0));
        assert_eq!(image.get(0, 1), Some(4.0));
        assert_eq!(image.get(3, 4), Some(19.0));
        assert_eq!(image.get(4, 0), None);
        assert_eq!(image.get(0, 5), None);
    }

    #[test]
    fn test_index_to_coords() {
        let image = ScalarImage::filled(12, 12, 0.0).unwrap();
        assert_eq!(image.index_to_coords(0), (0, 0));
        assert_eq!(image.index_to_coords(13), (1, 1));
        assert_eq!(image.index_to_coords(143), (11, 11));
    }

    #[test]
    fn test_rows() {
        let image = ScalarImage::index_ramp(3, 2).unwrap();
        let rows: Vec<&[f32]> = image.rows().collect();
        assert_eq!(rows, vec![&[0.0, 1.0, 2.0][..], &[3.0, 4.0, 5.0][..]]);
    }
}
