//! Long-screenshot capture engine for small scrollable displays: drives a device bridge through
//! repeated swipe/capture cycles, detects when scrolling has gone as far as it can, and stitches
//! the accumulated frames into a single tall PNG.

pub mod bridge;
pub mod config;
pub mod config_file;
pub mod detector;
pub mod engine;
pub mod error;
pub mod image_ops;
pub mod motion;
pub mod overlap;
pub mod progress;
pub mod stitch;

#[cfg(test)]
mod testutil;

pub use bridge::{AdbBridge, DeviceBridge, MockBridge};
pub use config::{CaptureConfig, CaptureResult, SwipeSpec};
pub use config_file::FileCaptureConfig;
pub use detector::{StopCheckResult, detect_scroll_termination};
pub use engine::capture;
pub use error::{CaptureError, Result};
pub use overlap::{OverlapResult, find_best_overlap};
pub use progress::{CapturePhase, CaptureProgress, LogLevel, LogSink, NullSink, ProgressSink};
