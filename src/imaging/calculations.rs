//! Pure calculation functions for thumbnail dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::codec::DCT_SIZE;

/// Pick the DCT prescale numerator (over 8) for decoding towards a target size.
///
/// Returns the smallest `k` in `1..=8` whose scaled output
/// `ceil(k × width / 8) × ceil(k × height / 8)` still covers the target in both
/// dimensions, or `None` when no reduction below full size is possible.
///
/// # Examples
/// ```
/// # use thumber::imaging::select_scale_numerator;
/// // 1000x750 towards 500x375 decodes at 4/8
/// assert_eq!(select_scale_numerator((1000, 750), (500, 375)), Some(4));
///
/// // Target as large as the source: no prescale
/// assert_eq!(select_scale_numerator((800, 600), (800, 600)), None);
/// ```
pub fn select_scale_numerator(source: (usize, usize), target: (usize, usize)) -> Option<usize> {
    let (width, height) = source;
    let (target_w, target_h) = target;

    (1..=DCT_SIZE)
        .find(|&k| {
            (k * width).div_ceil(DCT_SIZE) >= target_w && (k * height).div_ceil(DCT_SIZE) >= target_h
        })
        .filter(|&k| k < DCT_SIZE)
}

/// Shrink one side of `target` so it matches the source aspect ratio.
///
/// The comparisons use integer division and the adjusted side is rounded to
/// nearest. Width is checked first, so a target wider than the source aspect
/// gets a narrower width, otherwise a target taller than the source aspect
/// gets a shorter height.
///
/// # Examples
/// ```
/// # use thumber::imaging::fit_aspect;
/// assert_eq!(fit_aspect((1000, 750), (128, 128)), (128, 96));
/// assert_eq!(fit_aspect((750, 1000), (128, 128)), (96, 128));
/// ```
pub fn fit_aspect(source: (usize, usize), target: (usize, usize)) -> (usize, usize) {
    let (src_w, src_h) = source;
    let (mut dst_w, mut dst_h) = target;
    if src_w == 0 || src_h == 0 {
        return target;
    }

    if dst_w > dst_h * src_w / src_h {
        dst_w = round_half_up(dst_h as f64 * src_w as f64 / src_h as f64);
    } else if dst_h > dst_w * src_h / src_w {
        dst_h = round_half_up(dst_w as f64 * src_h as f64 / src_w as f64);
    }
    (dst_w, dst_h)
}

/// Decode-time target size: the thumbnail size times `factor`, rounded up.
///
/// A factor of zero or less disables prescaling.
pub fn prescale_target(thumbnail: (usize, usize), factor: f64) -> Option<(usize, usize)> {
    if factor > 0.0 && factor.is_finite() {
        Some((
            (thumbnail.0 as f64 * factor).ceil() as usize,
            (thumbnail.1 as f64 * factor).ceil() as usize,
        ))
    } else {
        None
    }
}

fn round_half_up(value: f64) -> usize {
    (value + 0.5).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // select_scale_numerator
    // =========================================================================

    #[test]
    fn half_size_target_selects_four_eighths() {
        assert_eq!(select_scale_numerator((1000, 750), (500, 375)), Some(4));
    }

    #[test]
    fn tiny_target_selects_one_eighth() {
        assert_eq!(select_scale_numerator((1000, 750), (100, 50)), Some(1));
    }

    #[test]
    fn both_dimensions_must_be_covered() {
        // Width alone would allow 2/8, height needs 3/8.
        assert_eq!(select_scale_numerator((1000, 300), (250, 110)), Some(3));
    }

    #[test]
    fn target_larger_than_source_disables_prescale() {
        assert_eq!(select_scale_numerator((100, 100), (200, 200)), None);
    }

    #[test]
    fn rounding_up_counts_towards_coverage() {
        // ceil(1 * 9 / 8) = 2
        assert_eq!(select_scale_numerator((9, 9), (2, 2)), Some(1));
    }

    // =========================================================================
    // fit_aspect
    // =========================================================================

    #[test]
    fn landscape_into_square_shortens_height() {
        assert_eq!(fit_aspect((1000, 750), (128, 128)), (128, 96));
    }

    #[test]
    fn portrait_into_square_narrows_width() {
        assert_eq!(fit_aspect((750, 1000), (128, 128)), (96, 128));
    }

    #[test]
    fn matching_aspect_is_unchanged() {
        assert_eq!(fit_aspect((200, 100), (100, 50)), (100, 50));
    }

    #[test]
    fn adjusted_side_rounds_to_nearest() {
        // 100 * 333 / 1000 = 33.3
        assert_eq!(fit_aspect((1000, 333), (100, 100)), (100, 33));
        // 100 * 335 / 1000 = 33.5
        assert_eq!(fit_aspect((1000, 335), (100, 100)), (100, 34));
    }

    #[test]
    fn zero_source_leaves_target() {
        assert_eq!(fit_aspect((0, 10), (64, 64)), (64, 64));
    }

    // =========================================================================
    // prescale_target
    // =========================================================================

    #[test]
    fn prescale_target_rounds_up() {
        assert_eq!(prescale_target((128, 96), 1.5), Some((192, 144)));
        assert_eq!(prescale_target((100, 33), 2.0), Some((200, 66)));
        assert_eq!(prescale_target((3, 3), 0.5), Some((2, 2)));
    }

    #[test]
    fn non_positive_factor_disables_prescale() {
        assert_eq!(prescale_target((128, 128), 0.0), None);
        assert_eq!(prescale_target((128, 128), -1.0), None);
    }
}
