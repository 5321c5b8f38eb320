//! Overlap seam finder (§4.3): locates where two consecutive frames overlap, for the stitcher.
//!
//! Same brute-force peak search as the motion estimator in `motion.rs`, but scoped to the
//! stitch-time overlap bounds (`min_overlap_ratio`/`max_overlap_ratio`) and always scored with
//! pixel-diff similarity rather than SSIM.

use crate::config::CaptureConfig;
use crate::image_ops::{grayscale_downscale, pixel_diff_similarity};
use image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapResult {
    pub overlap_px: u32,
    pub similarity: f64,
}

/// Finds the best-matching overlap between `prev`'s bottom rows and `curr`'s top rows.
pub fn find_best_overlap(prev: &RgbImage, curr: &RgbImage, config: &CaptureConfig) -> OverlapResult {
    let prev_small = grayscale_downscale(prev, config.downscale_width);
    let curr_small = grayscale_downscale(curr, config.downscale_width);
    let h = prev_small.height.min(curr_small.height);

    if h == 0 {
        return OverlapResult {
            overlap_px: 1,
            similarity: -2.0,
        };
    }

    let min_overlap = ((h as f64 * config.min_overlap_ratio).floor() as usize).max(8);
    let max_overlap = ((h as f64 * config.max_overlap_ratio).floor() as usize).min(h.saturating_sub(1));
    let step = (h / 220).max(1);

    let mut best_overlap = min_overlap;
    let mut best_similarity = -2.0_f64;

    let mut overlap = min_overlap;
    while overlap <= max_overlap {
        let a = prev_small.rows(h - overlap, h);
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
    OverlapResult {
        overlap_px,
        similarity: best_similarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CaptureConfig {
        CaptureConfig {
            output_path: "out.png".into(),
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn identical_frames_overlap_almost_entirely() {
        let frame = RgbImage::from_pixel(100, 200, image::Rgb([30, 60, 90]));
        let result = find_best_overlap(&frame, &frame, &cfg());
        assert!(result.similarity > 0.99);
        assert!(result.overlap_px > 100);
    }

    #[test]
    fn overlap_px_is_never_zero() {
        let a = RgbImage::from_pixel(80, 150, image::Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(80, 150, image::Rgb([255, 255, 255]));
        let result = find_best_overlap(&a, &b, &cfg());
        assert!(result.overlap_px >= 1);
    }
}
