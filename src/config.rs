use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Capture and stitching parameters. Validated once via [`CaptureConfig::validate`] before a
/// capture session starts; every field below is immutable for the lifetime of that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub output_path: PathBuf,
    pub serial: Option<String>,

    pub simple_mode: bool,

    pub swipe_x1: Option<i64>,
    pub swipe_y1: Option<i64>,
    pub swipe_x2: Option<i64>,
    pub swipe_y2: Option<i64>,
    pub swipe_duration_ms: u64,

    pub scroll_delay_ms: u64,
    pub max_swipes: u32,

    pub similarity_threshold: f64,
    pub use_ssim: bool,
    pub stop_region_ratio: f64,
    pub low_motion_px: u32,
    pub low_motion_similarity: f64,
    pub low_motion_consecutive: u32,

    pub min_overlap_ratio: f64,
    pub max_overlap_ratio: f64,
    pub overlap_min_similarity: f64,

    pub downscale_width: u32,
    pub circular_mask: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            serial: None,
            simple_mode: true,
            swipe_x1: None,
            swipe_y1: None,
            swipe_x2: None,
            swipe_y2: None,
            swipe_duration_ms: 300,
            scroll_delay_ms: 500,
            max_swipes: 30,
            similarity_threshold: 0.995,
            use_ssim: true,
            stop_region_ratio: 0.20,
            low_motion_px: 20,
            low_motion_similarity: 0.93,
            low_motion_consecutive: 2,
            min_overlap_ratio: 0.08,
            max_overlap_ratio: 0.92,
            overlap_min_similarity: 0.70,
            downscale_width: 320,
            circular_mask: false,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(CaptureError::invalid_config(
                "output_path",
                "must not be empty",
            ));
        }
        if self.max_swipes < 1 {
            return Err(CaptureError::invalid_config("max_swipes", "must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CaptureError::invalid_config(
                "similarity_threshold",
                "must be in [0, 1]",
            ));
        }
        if self.low_motion_px > 200 {
            return Err(CaptureError::invalid_config(
                "low_motion_px",
                "must be in [0, 200]",
            ));
        }
        if !(0.0..=1.0).contains(&self.low_motion_similarity) {
            return Err(CaptureError::invalid_config(
                "low_motion_similarity",
                "must be in [0, 1]",
            ));
        }
        if self.low_motion_consecutive < 1 {
            return Err(CaptureError::invalid_config(
                "low_motion_consecutive",
                "must be >= 1",
            ));
        }
        if !(self.stop_region_ratio > 0.0 && self.stop_region_ratio < 1.0) {
            return Err(CaptureError::invalid_config(
                "stop_region_ratio",
                "must be in (0, 1)",
            ));
        }
        if !(self.min_overlap_ratio > 0.0 && self.min_overlap_ratio < 1.0) {
            return Err(CaptureError::invalid_config(
                "min_overlap_ratio",
                "must be in (0, 1)",
            ));
        }
        if !(self.max_overlap_ratio > 0.0 && self.max_overlap_ratio < 1.0) {
            return Err(CaptureError::invalid_config(
                "max_overlap_ratio",
                "must be in (0, 1)",
            ));
        }
        if self.min_overlap_ratio >= self.max_overlap_ratio {
            return Err(CaptureError::invalid_config(
                "min_overlap_ratio",
                "must be < max_overlap_ratio",
            ));
        }
        if self.downscale_width < 64 {
            return Err(CaptureError::invalid_config(
                "downscale_width",
                "must be >= 64",
            ));
        }
        if !(0.0..=1.0).contains(&self.overlap_min_similarity) {
            return Err(CaptureError::invalid_config(
                "overlap_min_similarity",
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Swipe gesture derived once per session from the first captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeSpec {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
    pub duration_ms: u64,
}

impl SwipeSpec {
    /// Derives the swipe geometry per §4.5: simple mode ignores overrides entirely, advanced
    /// mode falls back to the simple-mode coordinate for any field left unset.
    pub fn derive(config: &CaptureConfig, width: u32, height: u32) -> Self {
        let auto_x = width as i64 / 2;
        let auto_y1 = (height as f64 * 0.78).round() as i64;
        let auto_y2 = (height as f64 * 0.24).round() as i64;

        if config.simple_mode {
            return SwipeSpec {
                x1: auto_x,
                y1: auto_y1,
                x2: auto_x,
                y2: auto_y2,
                duration_ms: 300,
            };
        }

        SwipeSpec {
            x1: config.swipe_x1.unwrap_or(auto_x),
            y1: config.swipe_y1.unwrap_or(auto_y1),
            x2: config.swipe_x2.unwrap_or(auto_x),
            y2: config.swipe_y2.unwrap_or(auto_y2),
            duration_ms: config.swipe_duration_ms,
        }
    }
}

/// Outcome of a successful capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub output_path: PathBuf,
    pub device_serial: String,
    pub frames_captured: u32,
    pub swipes_performed: u32,
    pub stop_reason: String,
    pub image_size: (u32, u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CaptureConfig {
        CaptureConfig {
            output_path: PathBuf::from("out.png"),
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn default_config_with_output_path_validates() {
        valid_config().validate().expect("should validate");
    }

    #[test]
    fn empty_output_path_is_rejected() {
        let cfg = CaptureConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_max_swipes_is_rejected() {
        let cfg = CaptureConfig {
            max_swipes: 0,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_overlap_ratios_are_rejected() {
        let cfg = CaptureConfig {
            min_overlap_ratio: 0.9,
            max_overlap_ratio: 0.5,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn downscale_width_below_minimum_is_rejected() {
        let cfg = CaptureConfig {
            downscale_width: 10,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn simple_mode_ignores_overrides() {
        let cfg = CaptureConfig {
            simple_mode: true,
            swipe_x1: Some(1),
            swipe_y1: Some(2),
            ..valid_config()
        };
        let swipe = SwipeSpec::derive(&cfg, 200, 400);
        assert_eq!(swipe.x1, 100);
        assert_eq!(swipe.y1, 312);
        assert_eq!(swipe.y2, 96);
        assert_eq!(swipe.duration_ms, 300);
    }

    #[test]
    fn advanced_mode_falls_back_to_auto_per_field() {
        let cfg = CaptureConfig {
            simple_mode: false,
            swipe_x1: Some(10),
            swipe_duration_ms: 777,
            ..valid_config()
        };
        let swipe = SwipeSpec::derive(&cfg, 200, 400);
        assert_eq!(swipe.x1, 10);
        assert_eq!(swipe.y1, 312);
        assert_eq!(swipe.x2, 100);
        assert_eq!(swipe.y2, 96);
        assert_eq!(swipe.duration_ms, 777);
    }
}
