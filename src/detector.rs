//! Motion & termination detector (§4.2): decides whether a newly captured frame represents
//! genuine scroll progress.

use crate::config::CaptureConfig;
use crate::image_ops::{grayscale_downscale, similarity};
use crate::motion::estimate_scroll_motion;
use image::RgbImage;

#[derive(Debug, Clone, PartialEq)]
pub struct StopCheckResult {
    pub should_stop: bool,
    pub reason: String,
    pub bottom_top_similarity: f64,
    pub full_similarity: f64,
    pub estimated_motion_px: u32,
    pub overlap_similarity: f64,
    pub low_motion_candidate: bool,
}

pub fn detect_scroll_termination(
    prev: &RgbImage,
    curr: &RgbImage,
    config: &CaptureConfig,
) -> StopCheckResult {
    let prev_small = grayscale_downscale(prev, config.downscale_width);
    let curr_small = grayscale_downscale(curr, config.downscale_width);
    let h = prev_small.height.min(curr_small.height);

    let strip = ((h as f64 * config.stop_region_ratio).round() as usize).max(8).min(h);
    let prev_bottom = prev_small.rows(h - strip, h);
    let curr_top = curr_small.rows(0, strip);

    let bottom_top_similarity = similarity(prev_bottom, curr_top, config.use_ssim)
        .expect("strips share shape by construction");
    let full_similarity = similarity(prev_small.rows(0, h), curr_small.rows(0, h), config.use_ssim)
        .expect("cropped matrices share shape by construction");

    let (estimated_motion_px, overlap_similarity) =
        estimate_scroll_motion(prev, &prev_small, &curr_small);

    let low_motion_candidate = overlap_similarity >= config.low_motion_similarity
        && estimated_motion_px <= config.low_motion_px;

    if bottom_top_similarity >= config.similarity_threshold {
        return StopCheckResult {
            should_stop: true,
            reason: "bottom/top region similarity threshold reached".to_string(),
            bottom_top_similarity,
            full_similarity,
            estimated_motion_px,
            overlap_similarity,
            low_motion_candidate,
        };
    }

    if full_similarity >= (config.similarity_threshold - 0.01).max(0.98) {
        return StopCheckResult {
            should_stop: true,
            reason: "frame-to-frame similarity indicates no further scrolling".to_string(),
            bottom_top_similarity,
            full_similarity,
            estimated_motion_px,
            overlap_similarity,
            low_motion_candidate,
        };
    }

    StopCheckResult {
        should_stop: false,
        reason: "continue".to_string(),
        bottom_top_similarity,
        full_similarity,
        estimated_motion_px,
        overlap_similarity,
        low_motion_candidate,
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
    fn identical_frames_stop_with_zero_motion() {
        let frame = RgbImage::from_pixel(120, 120, image::Rgb([80, 90, 100]));
        let result = detect_scroll_termination(&frame, &frame, &cfg());
        assert!(result.should_stop);
        assert_eq!(result.estimated_motion_px, 0);
    }

    #[test]
    fn full_similarity_is_symmetric() {
        let a = RgbImage::from_pixel(120, 160, image::Rgb([10, 200, 50]));
        let b = RgbImage::from_pixel(120, 160, image::Rgb([210, 30, 90]));
        let ab = detect_scroll_termination(&a, &b, &cfg());
        let ba = detect_scroll_termination(&b, &a, &cfg());
        assert!((ab.full_similarity - ba.full_similarity).abs() < 1e-9);
    }

    #[test]
    fn synthetic_scroll_termination_thresholds() {
        let canvas = crate::testutil::make_pattern_canvas(200, 2400);
        let frames = crate::testutil::make_scroll_frames(&canvas, 240, 84, 4, 0);
        let cfg = CaptureConfig {
            output_path: "out.png".into(),
            downscale_width: 200,
            similarity_threshold: 0.995,
            ..CaptureConfig::default()
        };

        let moving = detect_scroll_termination(&frames[0], &frames[1], &cfg);
        assert!(!moving.should_stop);
        assert!(moving.estimated_motion_px > 30);

        let stationary = detect_scroll_termination(&frames[2], &frames[2].clone(), &cfg);
        assert!(stationary.should_stop);
        assert_eq!(stationary.estimated_motion_px, 0);
    }
}
