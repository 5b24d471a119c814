//! Mirrored-repeat address mode emulation
//!
//! Reproduces the fixed-function mirrored-repeat addressing of a GPU sampler
//! as plain integer arithmetic over unnormalized pixel coordinates. The
//! coordinate is reflected about each boundary with period `2 * extent`, so a
//! row of width 4 reads `0 1 2 3 3 2 1 0 0 1 ...` as the coordinate increases.

use crate::image::Offset;

/// Maps a possibly out-of-range coordinate onto `[0, extent)` by mirrored repetition
///
/// # Arguments
/// * `shifted` - Signed pixel coordinate along one axis (may be negative)
/// * `extent` - Size of the source along that axis; must be non-zero
///
/// # Returns
/// The source index along that axis
pub fn mirrored_repeat_index(shifted: i64, extent: u32) -> u32 {
    debug_assert!(extent > 0, "mirrored_repeat_index requires a non-zero extent");

    let extent = i64::from(extent);
    let period = 2 * extent;

    // Negative coordinates fold onto the non-negative axis as -s - 1; written
    // as -(s + 1) so that i64::MIN does not overflow.
    let prime = if shifted >= 0 { shifted } else { -(shifted + 1) };
    let mod_2s = prime % period;

    let index = if mod_2s < extent { mod_2s } else { period - 1 - mod_2s };
    index as u32
}

/// Computes the source pixel read for destination pixel `(dst_x, dst_y)`
///
/// The offset is subtracted from the destination coordinate in signed
/// arithmetic, then each axis is mirrored independently.
///
/// # Arguments
/// * `dst_x`, `dst_y` - Destination pixel coordinate
/// * `offset` - Per-run shift applied before mirroring
/// * `source_dims` - `(width, height)` of the source image
///
/// # Returns
/// The `(x, y)` coordinate inside the source image
pub fn mirrored_source_coords(dst_x: u32, dst_y: u32, offset: Offset, source_dims: (u32, u32)) -> (u32, u32) {
    let shifted_x = i64::from(dst_x) - i64::from(offset.x);
    let shifted_y = i64::from(dst_y) - i64::from(offset.y);

    (mirrored_repeat_index(shifted_x, source_dims.0), mirrored_repeat_index(shifted_y, source_dims.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_is_a_triangle_wave() {
        let expected = [0, 1, 2, 3, 3, 2, 1, 0, 0, 1, 2, 3, 3];
        for (shifted, expected) in (0..).zip(expected) {
            assert_eq!(mirrored_repeat_index(shifted, 4), expected, "shifted = {shifted}");
        }
    }

    #[test]
    fn test_negative_coordinates_reflect_about_minus_half() {
        let cases = [(-1, 0), (-2, 1), (-3, 2), (-4, 3), (-5, 3), (-6, 2), (-7, 1), (-8, 0), (-9, 0)];
        for (shifted, expected) in cases {
            assert_eq!(mirrored_repeat_index(shifted, 4), expected, "shifted = {shifted}");
        }
    }

    #[test]
    fn test_index_stays_in_range() {
        for extent in 1..=9u32 {
            for shifted in -100..=100i64 {
                let index = mirrored_repeat_index(shifted, extent);
                assert!(index < extent, "extent {extent}, shifted {shifted} -> {index}");
            }
        }
    }

    #[test]
    fn test_period_is_palindromic() {
        for extent in 1..=7u32 {
            let period = 2 * i64::from(extent);
            for base in [-3 * period, -period, 0, period, 5 * period] {
                let sequence: Vec<u32> = (base..base + period).map(|s| mirrored_repeat_index(s, extent)).collect();
                let reversed: Vec<u32> = sequence.iter().rev().copied().collect();
                assert_eq!(sequence, reversed, "extent {extent}, base {base}");
            }
        }
    }

    #[test]
    fn test_extent_one_always_reads_zero() {
        for shifted in -10..=10 {
            assert_eq!(mirrored_repeat_index(shifted, 1), 0);
        }
    }

    #[test]
    fn test_extreme_coordinates() {
        assert!(mirrored_repeat_index(i64::MIN, 5) < 5);
        assert!(mirrored_repeat_index(i64::MAX, 5) < 5);
        assert!(mirrored_repeat_index(i64::MIN, u32::MAX) < u32::MAX);
    }

    #[test]
    fn test_source_coords_for_canonical_corner() {
        // (0, 0) shifted by (5, 2) lands on (-5, -2), which mirrors to (3, 1)
        assert_eq!(mirrored_source_coords(0, 0, Offset::new(5, 2), (4, 5)), (3, 1));
        assert_eq!(mirrored_source_coords(5, 2, Offset::new(5, 2), (4, 5)), (0, 0));
        assert_eq!(mirrored_source_coords(11, 11, Offset::new(5, 2), (4, 5)), (1, 0));
    }
}
