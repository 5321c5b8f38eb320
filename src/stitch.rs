//! Frame stitcher (§4.4): concatenates captured frames into one tall image, cropping each
//! successive frame at its detected overlap seam.

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::overlap::find_best_overlap;
use image::{Rgba, RgbaImage, RgbImage, imageops::FilterType};
use imageproc::drawing::draw_filled_ellipse_mut;

/// Normalizes every frame to frame[0]'s size, then concatenates them top to bottom, cropping
/// each successive frame at its best-matching overlap row.
pub fn stitch_frames(frames: &[RgbImage], config: &CaptureConfig) -> Result<RgbImage> {
    let first = frames.first().ok_or_else(|| {
        CaptureError::InvalidArgument("no frames to stitch".to_string())
    })?;
    let (base_w, base_h) = first.dimensions();

    let normalized: Vec<RgbImage> = frames
        .iter()
        .map(|frame| {
            if frame.dimensions() == (base_w, base_h) {
                frame.clone()
            } else {
                image::imageops::resize(frame, base_w, base_h, FilterType::Triangle)
            }
        })
        .collect();

    let mut strips: Vec<RgbImage> = vec![normalized[0].clone()];
    let mut prev = &normalized[0];

    for curr in normalized.iter().skip(1) {
        let overlap = find_best_overlap(prev, curr, config);
        if overlap.similarity < config.overlap_min_similarity {
            strips.push(curr.clone());
        } else {
            let crop_start = overlap.overlap_px.clamp(1, curr.height().saturating_sub(1));
            let cropped =
                image::imageops::crop_imm(curr, 0, crop_start, curr.width(), curr.height() - crop_start)
                    .to_image();
            strips.push(cropped);
        }
        prev = curr;
    }

    let total_height: u32 = strips.iter().map(|s| s.height()).sum();
    let mut out = RgbImage::new(base_w, total_height);
    let mut y_offset = 0;
    for strip in &strips {
        image::imageops::replace(&mut out, strip, 0, y_offset as i64);
        y_offset += strip.height();
    }
    Ok(out)
}

/// Crops to the largest centered square and paints an alpha ellipse mask filling it, so the
/// stitched image can be rendered as a circular watch-face thumbnail.
pub fn apply_circular_mask(image: &RgbImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let side = w.min(h);
    let left = (w - side) / 2;
    let top = (h - side) / 2;

    let square = image::imageops::crop_imm(image, left, top, side, side).to_image();

    let mut mask = image::GrayImage::new(side, side);
    let radius = (side as f32 / 2.0).max(1.0) as i32;
    let center = (radius, radius);
    draw_filled_ellipse_mut(&mut mask, center, radius, radius, image::Luma([255u8]));

    let mut out = RgbaImage::new(side, side);
    for y in 0..side {
        for x in 0..side {
            let rgb = square.get_pixel(x, y);
            let alpha = mask.get_pixel(x, y)[0];
            out.put_pixel(x, y, Rgba([rgb[0], rgb[1], rgb[2], alpha]));
        }
    }
    out
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
    fn stitching_empty_input_is_an_error() {
        let frames: Vec<RgbImage> = Vec::new();
        assert!(stitch_frames(&frames, &cfg()).is_err());
    }

    #[test]
    fn single_frame_stitches_to_itself() {
        let frame = RgbImage::from_pixel(40, 60, image::Rgb([1, 2, 3]));
        let out = stitch_frames(std::slice::from_ref(&frame), &cfg()).unwrap();
        assert_eq!(out.dimensions(), frame.dimensions());
    }

    #[test]
    fn stitched_height_grows_with_low_overlap_similarity() {
        let canvas = crate::testutil::make_pattern_canvas(120, 900);
        let frames = crate::testutil::make_scroll_frames(&canvas, 200, 150, 3, 0);
        let out = stitch_frames(&frames, &cfg()).unwrap();
        assert!(out.height() > 200);
        assert!(out.height() < 600);
    }

    #[test]
    fn circular_mask_crops_to_square_and_adds_alpha() {
        let frame = RgbImage::from_pixel(80, 50, image::Rgb([200, 100, 50]));
        let masked = apply_circular_mask(&frame);
        assert_eq!(masked.dimensions(), (50, 50));
        let corner = masked.get_pixel(0, 0);
        let center = masked.get_pixel(25, 25);
        assert_eq!(corner[3], 0);
        assert_eq!(center[3], 255);
    }
}
