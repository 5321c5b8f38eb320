//! Grayscale downscale and similarity primitives shared by the detector and the overlap finder.

use crate::error::{CaptureError, Result};
use image::{Pixel, RgbImage, imageops::FilterType};

/// A 2-D grayscale matrix of luminance values in `[0, 255]`, stored row-major.
#[derive(Debug, Clone)]
pub struct GrayMatrix {
    pub width: usize,
    pub height: usize,
    data: Vec<f64>,
}

impl GrayMatrix {
    fn new(width: usize, height: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// A view over a contiguous run of rows `[start, end)`, without copying.
    pub fn rows(&self, start: usize, end: usize) -> RowSlice<'_> {
        RowSlice {
            matrix: self,
            start,
            end,
        }
    }
}

/// A borrowed, row-bounded view into a [`GrayMatrix`].
#[derive(Debug, Clone, Copy)]
pub struct RowSlice<'a> {
    matrix: &'a GrayMatrix,
    start: usize,
    end: usize,
}

impl<'a> RowSlice<'a> {
    pub fn height(&self) -> usize {
        self.end - self.start
    }

    pub fn width(&self) -> usize {
        self.matrix.width
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix.get(self.start + row, col)
    }

    fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.height()).flat_map(move |r| (0..self.width()).map(move |c| self.get(r, c)))
    }
}

/// Converts `image` to grayscale and, if wider than `target_width`, resamples it bilinearly down
/// to `target_width` while preserving aspect ratio (height rounded, floored at 1 row).
pub fn grayscale_downscale(image: &RgbImage, target_width: u32) -> GrayMatrix {
    let (width, height) = image.dimensions();

    let (gray_width, gray_height, source): (u32, u32, RgbImage);
    if width <= target_width {
        gray_width = width;
        gray_height = height;
        source = image.clone();
    } else {
        gray_width = target_width;
        gray_height = ((height as f64) * (target_width as f64 / width as f64))
            .round()
            .max(1.0) as u32;
        let resized = image::imageops::resize(image, gray_width, gray_height, FilterType::Triangle);
        source = resized;
    }

    let mut data = Vec::with_capacity((gray_width * gray_height) as usize);
    for y in 0..gray_height {
        for x in 0..gray_width {
            let pixel = source.get_pixel(x, y).to_luma();
            data.push(pixel[0] as f64);
        }
    }

    GrayMatrix::new(gray_width as usize, gray_height as usize, data)
}

/// `max(0, 1 - mean(|a - b|) / 255)`. Requires `a` and `b` to have equal shape.
pub fn pixel_diff_similarity(a: RowSlice<'_>, b: RowSlice<'_>) -> Result<f64> {
    require_equal_shape(a, b)?;
    let count = (a.height() * a.width()) as f64;
    if count == 0.0 {
        return Ok(1.0);
    }
    let sum_abs_diff: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum();
    let mean_abs_diff = sum_abs_diff / count;
    Ok((1.0 - mean_abs_diff / 255.0).max(0.0))
}

/// Global (single-window) SSIM, per §4.1. Requires `a` and `b` to have equal shape.
pub fn ssim_similarity(a: RowSlice<'_>, b: RowSlice<'_>) -> Result<f64> {
    require_equal_shape(a, b)?;
    const C1: f64 = 0.01 * 255.0 * 0.01 * 255.0;
    const C2: f64 = 0.03 * 255.0 * 0.03 * 255.0;

    let count = (a.height() * a.width()) as f64;
    if count == 0.0 {
        return Ok(1.0);
    }

    let mu_a: f64 = a.iter().sum::<f64>() / count;
    let mu_b: f64 = b.iter().sum::<f64>() / count;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut cov = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mu_a;
        let db = y - mu_b;
        var_a += da * da;
        var_b += db * db;
        cov += da * db;
    }
    var_a /= count;
    var_b /= count;
    cov /= count;

    let numerator = (2.0 * mu_a * mu_b + C1) * (2.0 * cov + C2);
    let denominator = (mu_a * mu_a + mu_b * mu_b + C1) * (var_a + var_b + C2);

    if denominator == 0.0 {
        return Ok(1.0);
    }
    Ok((numerator / denominator).clamp(-1.0, 1.0))
}

/// Dispatches to SSIM or pixel-diff similarity depending on `use_ssim`.
pub fn similarity(a: RowSlice<'_>, b: RowSlice<'_>, use_ssim: bool) -> Result<f64> {
    if use_ssim {
        ssim_similarity(a, b)
    } else {
        pixel_diff_similarity(a, b)
    }
}

fn require_equal_shape(a: RowSlice<'_>, b: RowSlice<'_>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(CaptureError::InvalidArgument(format!(
            "similarity requires equal shapes, got {:?} and {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}
