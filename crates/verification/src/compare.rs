//! Image comparison utilities for verification
//!
//! This module compares the host reference output against the output of a
//! compute backend using exact floating-point equality.

use mirror_sampler::ScalarImage;

/// Result of comparing two images
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareResult {
    /// Images match exactly
    Match,
    /// Images have different dimensions
    DimensionMismatch {
        /// Dimensions of the reference output
        expected_dimensions: (u32, u32),
        /// Dimensions of the backend output
        actual_dimensions: (u32, u32),
    },
    /// The first element (in row-major order) whose values differ
    ValueMismatch {
        /// Flat row-major index
        index: usize,
        x: u32,
        y: u32,
        /// Value computed by the reference evaluator
        expected: f32,
        /// Value written by the backend
        actual: f32,
    },
}

impl CompareResult {
    pub fn is_match(&self) -> bool {
        matches!(self, CompareResult::Match)
    }
}

/// Compares two scalar images element by element
///
/// Scanning stops at the first mismatch, so only that element is reported.
/// Equality is exact: no tolerance is applied, and a NaN never matches.
///
/// # Arguments
/// * `expected` - Reference image from the host evaluator
/// * `actual` - Image produced by the backend under test
///
/// # Returns
/// A `CompareResult` indicating whether the images match and where they first differ
pub fn compare_images(expected: &ScalarImage, actual: &ScalarImage) -> CompareResult {
    // If dimensions don't match, the comparison fails immediately
    if expected.dimensions() != actual.dimensions() {
        return CompareResult::DimensionMismatch {
            expected_dimensions: expected.dimensions(),
            actual_dimensions: actual.dimensions(),
        };
    }

    let first_mismatch = expected.as_slice().iter().zip(actual.as_slice()).position(|(e, a)| e != a);

    match first_mismatch {
        None => CompareResult::Match,
        Some(index) => {
            let (x, y) = expected.index_to_coords(index);
            CompareResult::ValueMismatch {
                index,
                x,
                y,
                expected: expected.as_slice()[index],
                actual: actual.as_slice()[index],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_images_match() {
        let a = ScalarImage::index_ramp(12, 12).unwrap();
        let b = a.clone();
        assert_eq!(compare_images(&a, &b), CompareResult::Match);
        assert!(compare_images(&a, &b).is_match());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = ScalarImage::index_ramp(12, 12).unwrap();
        let b = ScalarImage::index_ramp(12, 11).unwrap();
        assert_eq!(
            compare_images(&a, &b),
            CompareResult::DimensionMismatch {
                expected_dimensions: (12, 12),
                actual_dimensions: (12, 11),
            }
        );
    }

    #[test]
    fn test_only_first_mismatch_is_reported() {
        let expected = ScalarImage::index_ramp(4, 3).unwrap();
        let mut data = expected.clone().into_vec();
        data[6] = 100.0;
        data[9] = -1.0;
        let actual = ScalarImage::new(4, 3, data).unwrap();

        assert_eq!(
            compare_images(&expected, &actual),
            CompareResult::ValueMismatch {
                index: 6,
                x: 2,
                y: 1,
                expected: 6.0,
                actual: 100.0,
            }
        );
    }

    #[test]
    fn test_comparison_is_exact() {
        let expected = ScalarImage::filled(2, 2, 1.0).unwrap();
        let actual = ScalarImage::new(2, 2, vec![1.0, 1.0, 1.0, 1.0 + f32::EPSILON]).unwrap();
        assert!(matches!(compare_images(&expected, &actual), CompareResult::ValueMismatch { index: 3, .. }));
    }

    #[test]
    fn test_nan_never_matches() {
        let expected = ScalarImage::filled(1, 1, f32::NAN).unwrap();
        let actual = expected.clone();
        assert!(!compare_images(&expected, &actual).is_match());
    }
}
