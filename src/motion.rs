//! Scroll motion estimator (§4.2.1): brute-force overlap search biased toward large overlaps,
//! used by the termination detector to quantify how far the content moved between two frames.

use crate::image_ops::{GrayMatrix, pixel_diff_similarity};
use image::RgbImage;

/// `(estimated_motion_px, overlap_similarity)` for the best-matching overlap found.
pub fn estimate_scroll_motion(
    prev: &RgbImage,
    prev_small: &GrayMatrix,
    curr_small: &GrayMatrix,
) -> (u32, f64) {
    let h = prev_small.height.min(curr_small.height);
    if h == 0 {
        return (0, 0.0);
    }

    let min_overlap = ((h as f64 * 0.55).floor() as usize).max(8);
    let step = (h / 240).max(1);

    let mut best_overlap = min_overlap;
    let mut best_similarity = -2.0_f64;

    let mut overlap = min_overlap;
    while overlap <= h {
        let a = prev_small.rows(h.saturating_sub(overlap), h);
        let b = curr_small.rows(0, overlap);
        let sim = pixel_diff_similarity(a, b).expect("rows() views always share shape by construction");
        if sim > best_similarity {
            best_similarity = sim;
            best_overlap = overlap;
        }
        overlap += step;
    }

    let scale = prev.height() as f64 / prev_small.height as f64;
    let overlap_px = ((best_overlap as f64 * scale).round() as u32).max(1);
    let motion_px = prev.height().saturating_sub(overlap_px);
    (motion_px, best_similarity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_ops::grayscale_downscale;

    #[test]
    fn identical_frames_have_zero_motion() {
        let frame = RgbImage::from_pixel(60, 200, image::Rgb([40, 80, 120]));
        let small = grayscale_downscale(&frame, 60);
        let (motion, sim) = estimate_scroll_motion(&frame, &small, &small);
        assert_eq!(motion, 0);
        assert!(sim > 0.99);
    }

    #[test]
    fn distinct_frames_report_nonzero_similarity() {
        let a = RgbImage::from_pixel(60, 200, image::Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(60, 200, image::Rgb([255, 255, 255]));
        let ga = grayscale_downscale(&a, 60);
        let gb = grayscale_downscale(&b, 60);
        let (motion, _sim) = estimate_scroll_motion(&a, &ga, &gb);
        // Fully dissimilar content still resolves to the minimum-overlap candidate; since both
        // are flat the "best" overlap stays at the search floor regardless of polarity.
        assert!(motion <= 200);
    }
}
