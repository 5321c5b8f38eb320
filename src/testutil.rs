//! Synthetic fixtures shared by unit tests across modules (scenarios S3-S6 in SPEC_FULL.md §8).

#![cfg(test)]

use crate::bridge::DeviceBridge;
use crate::error::Result;
use image::{Rgb, RgbImage};
use std::sync::Mutex;

/// A deterministic, non-repeating pattern so overlap search has real structure to lock onto,
/// rather than degenerating to "everything matches everything" on a flat color.
pub fn make_pattern_canvas(width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let xi = x as i64;
            let yi = y as i64;
            let r = (xi * 3 + yi * 5 + (yi / 37) * 23).rem_euclid(256) as u8;
            let g = (xi * 7 + yi * 2 + ((xi / 29) ^ (yi / 31)) * 11).rem_euclid(256) as u8;
            let b = (xi * 11 + yi * 13 + ((xi + yi) / 17) * 19).rem_euclid(256) as u8;
            canvas.put_pixel(x, y, Rgb([r, g, b]));
        }
    }
    canvas
}

/// Crops `count` overlapping viewports of `frame_height` out of `canvas`, advancing by `step`
/// rows each time and clamping the last few so every frame stays in bounds.
pub fn make_scroll_frames(
    canvas: &RgbImage,
    frame_height: u32,
    step: u32,
    count: u32,
    start_y: u32,
) -> Vec<RgbImage> {
    let max_y = canvas.height() - frame_height;
    (0..count)
        .map(|idx| {
            let y = (start_y + idx * step).min(max_y);
            image::imageops::crop_imm(canvas, 0, y, canvas.width(), frame_height).to_image()
        })
        .collect()
}

/// A bridge that serves a fixed frame sequence, advancing its cursor on each swipe and clamping
/// at the last frame — mirrors the original Python test double `FakeAdbSequence`.
pub struct SequenceBridge {
    frames: Vec<RgbImage>,
    cursor: Mutex<usize>,
    serial: String,
}

impl SequenceBridge {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        assert!(!frames.is_empty(), "frames must not be empty");
        Self {
            frames,
            cursor: Mutex::new(0),
            serial: "fake-serial".to_string(),
        }
    }
}

impl DeviceBridge for SequenceBridge {
    fn is_available(&self) -> bool {
        true
    }

    fn list_online_serials(&self) -> Result<Vec<String>> {
        Ok(vec![self.serial.clone()])
    }

    fn capture_screen(&self, _serial: &str) -> Result<RgbImage> {
        let cursor = *self.cursor.lock().unwrap();
        Ok(self.frames[cursor.min(self.frames.len() - 1)].clone())
    }

    fn swipe(
        &self,
        _serial: &str,
        _x1: i64,
        _y1: i64,
        _x2: i64,
        _y2: i64,
        _duration_ms: u64,
    ) -> Result<()> {
        let mut cursor = self.cursor.lock().unwrap();
        if *cursor < self.frames.len() - 1 {
            *cursor += 1;
        }
        Ok(())
    }
}
