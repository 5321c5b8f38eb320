//! Progress and log sinks (§5, §9 "dynamic callback sinks"): small capability handles the engine
//! invokes synchronously on its own thread. Consumers that need decoupling push onto their own
//! queue from inside their sink implementation.

use image::{RgbImage, imageops::FilterType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Initial,
    Iteration,
    Stopping,
    Complete,
}

/// Per-iteration detector metrics attached to `CapturePhase::Iteration` events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressMetrics {
    pub bottom_top_similarity: f64,
    pub full_similarity: f64,
    pub estimated_motion_px: u32,
    pub overlap_similarity: f64,
    pub low_motion_candidate: bool,
}

#[derive(Debug, Clone)]
pub struct CaptureProgress {
    pub phase: CapturePhase,
    pub message: String,
    pub elapsed_sec: f64,
    pub swipes_performed: u32,
    pub frames_captured: u32,
    pub max_swipes: u32,
    pub metrics: Option<ProgressMetrics>,
    pub thumbnail: Option<RgbImage>,
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &CaptureProgress);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// A sink that discards everything; useful as a default when the caller doesn't care.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _progress: &CaptureProgress) {}
}

impl LogSink for NullSink {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

const THUMBNAIL_MAX_SIDE: u32 = 240;

/// Downscales `frame` so its long side is at most [`THUMBNAIL_MAX_SIDE`] pixels, for attaching to
/// progress events without ballooning their size.
pub fn make_thumbnail(frame: &RgbImage) -> RgbImage {
    let (w, h) = frame.dimensions();
    let long_side = w.max(h);
    if long_side <= THUMBNAIL_MAX_SIDE {
        return frame.clone();
    }
    let scale = THUMBNAIL_MAX_SIDE as f64 / long_side as f64;
    let target_w = ((w as f64 * scale).round().max(1.0)) as u32;
    let target_h = ((h as f64 * scale).round().max(1.0)) as u32;
    image::imageops::resize(frame, target_w, target_h, FilterType::Triangle)
}
