//! Safe casting utilities for pixel coordinates and sample counts

use std::ops::Range;

/// Convert a sample count to f64
///
/// Counts handled by the pipeline stay far below 2^52, so the conversion is exact.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn count_to_f64(value: usize) -> f64 {
    value as f64
}

/// Clamp and convert f64 to i64 for pixel coordinates
#[must_use]
#[allow(clippy::cast_precision_loss)] // Acceptable for clamping bounds
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i64_clamp(value: f64, min: i64, max: i64) -> i64 {
    // Ensure min <= max
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(min as f64, max as f64);

    let result = clamped.floor() as i64;
    result.clamp(min, max)
}

/// Pixel index range covered by `center ± half` on an axis of `limit` pixels
///
/// The range is clamped to `0..limit`; `None` means it does not overlap the image.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Bounded by limit
#[allow(clippy::cast_sign_loss)] // Bounded below by 0
pub fn clamped_pixel_range(center: f64, half: f64, limit: u32) -> Option<Range<u32>> {
    if limit == 0 || !center.is_finite() || !half.is_finite() || half < 0.0 {
        return None;
    }

    let upper = i64::from(limit);
    let start = f64_to_i64_clamp(center - half, -1, upper).max(0);
    let end = f64_to_i64_clamp(center + half, -1, upper).min(upper);

    if start >= end {
        None
    } else {
        Some(start as u32..end as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_count_to_f64() {
        assert_eq!(count_to_f64(0), 0.0);
        assert_eq!(count_to_f64(150), 150.0);
    }

    #[test]
    fn test_f64_to_i64_clamp() {
        assert_eq!(f64_to_i64_clamp(50.7, 0, 100), 50);
        assert_eq!(f64_to_i64_clamp(-10.0, 0, 100), 0);
        assert_eq!(f64_to_i64_clamp(150.0, 0, 100), 100);
        assert_eq!(f64_to_i64_clamp(f64::NAN, 0, 100), 0);
        assert_eq!(f64_to_i64_clamp(f64::INFINITY, 0, 100), 0);
        assert_eq!(f64_to_i64_clamp(5.0, 100, 0), 5);
    }

    #[test]
    fn test_clamped_pixel_range_inside() {
        assert_eq!(clamped_pixel_range(50.0, 10.0, 224), Some(40..60));
    }

    #[test]
    fn test_clamped_pixel_range_partially_outside() {
        assert_eq!(clamped_pixel_range(3.0, 10.0, 224), Some(0..13));
        assert_eq!(clamped_pixel_range(220.0, 10.0, 224), Some(210..224));
    }

    #[test]
    fn test_clamped_pixel_range_fully_outside() {
        assert_eq!(clamped_pixel_range(-50.0, 10.0, 224), None);
        assert_eq!(clamped_pixel_range(400.0, 10.0, 224), None);
        assert_eq!(clamped_pixel_range(10.0, 5.0, 0), None);
        assert_eq!(clamped_pixel_range(f64::NAN, 5.0, 100), None);
    }

    proptest! {
        #[test]
        fn prop_clamped_pixel_range_within_image(
            center in -1000.0f64..1000.0,
            half in 0.0f64..200.0,
            limit in 0u32..500
        ) {
            if let Some(range) = clamped_pixel_range(center, half, limit) {
                prop_assert!(range.start < range.end);
                prop_assert!(range.end <= limit);
            }
        }

        #[test]
        fn prop_f64_to_i64_clamp_always_within_bounds(
            value in any::<f64>(),
            min in -10_000i64..10_000,
            max in -10_000i64..10_000
        ) {
            let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
            let result = f64_to_i64_clamp(value, min, max);
            prop_assert!(result >= lo);
            prop_assert!(result <= hi);
        }
    }
}
