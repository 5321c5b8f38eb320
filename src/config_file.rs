//! TOML configuration seed (§4.7): an optional overlay loaded before CLI flags are applied.
//! Every field is `Option<T>`; a field left unset in the file keeps the built-in default.

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileCaptureConfig {
    pub output_path: Option<PathBuf>,
    pub serial: Option<String>,
    pub simple_mode: Option<bool>,
    pub swipe_x1: Option<i64>,
    pub swipe_y1: Option<i64>,
    pub swipe_x2: Option<i64>,
    pub swipe_y2: Option<i64>,
    pub swipe_duration_ms: Option<u64>,
    pub scroll_delay_ms: Option<u64>,
    pub max_swipes: Option<u32>,
    pub similarity_threshold: Option<f64>,
    pub use_ssim: Option<bool>,
    pub stop_region_ratio: Option<f64>,
    pub low_motion_px: Option<u32>,
    pub low_motion_similarity: Option<f64>,
    pub low_motion_consecutive: Option<u32>,
    pub min_overlap_ratio: Option<f64>,
    pub max_overlap_ratio: Option<f64>,
    pub overlap_min_similarity: Option<f64>,
    pub downscale_width: Option<u32>,
    pub circular_mask: Option<bool>,
}

impl FileCaptureConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CaptureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|err| {
            CaptureError::invalid_config("config_file", format!("{}: {err}", path.display()))
        })
    }

    /// Overlays every field this file sets onto `base`, leaving unset fields untouched.
    pub fn apply_onto(&self, base: CaptureConfig) -> CaptureConfig {
        CaptureConfig {
            output_path: self.output_path.clone().unwrap_or(base.output_path),
            serial: self.serial.clone().or(base.serial),
            simple_mode: self.simple_mode.unwrap_or(base.simple_mode),
            swipe_x1: self.swipe_x1.or(base.swipe_x1),
            swipe_y1: self.swipe_y1.or(base.swipe_y1),
            swipe_x2: self.swipe_x2.or(base.swipe_x2),
            swipe_y2: self.swipe_y2.or(base.swipe_y2),
            swipe_duration_ms: self.swipe_duration_ms.unwrap_or(base.swipe_duration_ms),
            scroll_delay_ms: self.scroll_delay_ms.unwrap_or(base.scroll_delay_ms),
            max_swipes: self.max_swipes.unwrap_or(base.max_swipes),
            similarity_threshold: self.similarity_threshold.unwrap_or(base.similarity_threshold),
            use_ssim: self.use_ssim.unwrap_or(base.use_ssim),
            stop_region_ratio: self.stop_region_ratio.unwrap_or(base.stop_region_ratio),
            low_motion_px: self.low_motion_px.unwrap_or(base.low_motion_px),
            low_motion_similarity: self
                .low_motion_similarity
                .unwrap_or(base.low_motion_similarity),
            low_motion_consecutive: self
                .low_motion_consecutive
                .unwrap_or(base.low_motion_consecutive),
            min_overlap_ratio: self.min_overlap_ratio.unwrap_or(base.min_overlap_ratio),
            max_overlap_ratio: self.max_overlap_ratio.unwrap_or(base.max_overlap_ratio),
            overlap_min_similarity: self
                .overlap_min_similarity
                .unwrap_or(base.overlap_min_similarity),
            downscale_width: self.downscale_width.unwrap_or(base.downscale_width),
            circular_mask: self.circular_mask.unwrap_or(base.circular_mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_keep_defaults() {
        let file = FileCaptureConfig::default();
        let merged = file.apply_onto(CaptureConfig::default());
        assert_eq!(merged.max_swipes, CaptureConfig::default().max_swipes);
    }

    #[test]
    fn file_overrides_default_but_not_explicit_override() {
        let file = FileCaptureConfig {
            max_swipes: Some(10),
            similarity_threshold: Some(0.9),
            ..Default::default()
        };
        let base = CaptureConfig::default();
        let merged = file.apply_onto(base);
        assert_eq!(merged.max_swipes, 10);
        assert_eq!(merged.similarity_threshold, 0.9);

        // Simulating a CLI flag applied after the file: it wins over both defaults and file.
        let with_cli_override = CaptureConfig {
            max_swipes: 7,
            ..merged
        };
        assert_eq!(with_cli_override.max_swipes, 7);
    }

    #[test]
    fn loading_missing_file_is_an_error() {
        let result = FileCaptureConfig::load(Path::new("/nonexistent/scrollcap.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn loading_malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_swipes = [this is not valid").unwrap();
        assert!(FileCaptureConfig::load(&path).is_err());
    }

    #[test]
    fn loading_valid_toml_seeds_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.toml");
        std::fs::write(&path, "max_swipes = 12\nuse_ssim = false\n").unwrap();
        let file = FileCaptureConfig::load(&path).unwrap();
        assert_eq!(file.max_swipes, Some(12));
        assert_eq!(file.use_ssim, Some(false));
    }
}
