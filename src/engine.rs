//! Capture engine (§4.5): the state machine that resolves a device, drives the swipe/capture
//! loop, and stitches the result. Runs on a single thread; callers host it on a worker thread and
//! decouple sinks themselves if they need to reach a UI.

use crate::bridge::DeviceBridge;
use crate::config::{CaptureConfig, CaptureResult, SwipeSpec};
use crate::detector::detect_scroll_termination;
use crate::error::{CaptureError, Result};
use crate::progress::{
    CapturePhase, CaptureProgress, LogLevel, LogSink, NullSink, ProgressMetrics, ProgressSink,
    make_thumbnail,
};
use crate::stitch::{apply_circular_mask, stitch_frames};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const CANCEL_POLL_SLICE: Duration = Duration::from_millis(50);
const USER_STOP_REASON: &str = "user requested stop";

/// Runs one full capture: validate config, resolve the device, swipe/capture/detect in a loop,
/// then stitch and save the result.
pub fn capture(
    config: &CaptureConfig,
    bridge: &dyn DeviceBridge,
    log: Option<&dyn LogSink>,
    progress: Option<&dyn ProgressSink>,
    cancel: Option<&AtomicBool>,
) -> Result<CaptureResult> {
    let log = log.unwrap_or(&NullSink);
    let progress = progress.unwrap_or(&NullSink);
    let start = Instant::now();

    config.validate()?;

    if !bridge.is_available() {
        return Err(CaptureError::BridgeUnavailable {
            binary: "adb".to_string(),
        });
    }

    let serial = resolve_serial(bridge, config.serial.as_deref())?;
    log.log(LogLevel::Info, &format!("using device: {serial}"));

    let mut frames: Vec<RgbImage> = Vec::new();
    let first = bridge.capture_screen(&serial)?;
    let (width, height) = first.dimensions();
    frames.push(first.clone());
    log.log(
        LogLevel::Info,
        &format!("captured initial frame: {width}x{height}"),
    );
    emit_progress(
        progress,
        CapturePhase::Initial,
        "captured initial frame".to_string(),
        start,
        0,
        1,
        config.max_swipes,
        None,
        Some(&first),
    );

    let swipe = SwipeSpec::derive(config, width, height);
    log.log(
        LogLevel::Info,
        &format!(
            "swipe config: ({},{}) -> ({},{}), duration={}ms",
            swipe.x1, swipe.y1, swipe.x2, swipe.y2, swipe.duration_ms
        ),
    );

    let mut prev = first;
    let mut stop_reason = "max swipes reached".to_string();
    let mut performed_swipes: u32 = 0;
    let mut low_motion_hits: u32 = 0;

    for iteration in 0..config.max_swipes {
        if is_cancelled(cancel) {
            stop_reason = USER_STOP_REASON.to_string();
            log.log(LogLevel::Info, &format!("stopping capture: {stop_reason}"));
            break;
        }

        bridge.swipe(
            &serial,
            swipe.x1,
            swipe.y1,
            swipe.x2,
            swipe.y2,
            swipe.duration_ms,
        )?;
        performed_swipes += 1;

        if sleep_with_cancel(config.scroll_delay_ms, cancel) {
            stop_reason = USER_STOP_REASON.to_string();
            log.log(LogLevel::Info, &format!("stopping capture: {stop_reason}"));
            break;
        }

        let mut curr = bridge.capture_screen(&serial)?;
        if curr.dimensions() != (width, height) {
            curr = image::imageops::resize(&curr, width, height, FilterType::Triangle);
        }

        if is_cancelled(cancel) {
            frames.push(curr);
            stop_reason = USER_STOP_REASON.to_string();
            log.log(LogLevel::Info, &format!("stopping capture: {stop_reason}"));
            break;
        }

        let check = detect_scroll_termination(&prev, &curr, config);
        log.log(
            LogLevel::Debug,
            &format!(
                "iteration {}: bottom-top={:.4}, full={:.4}, motion_px={}, overlap_sim={:.4}",
                iteration + 1,
                check.bottom_top_similarity,
                check.full_similarity,
                check.estimated_motion_px,
                check.overlap_similarity
            ),
        );
        emit_progress(
            progress,
            CapturePhase::Iteration,
            format!("iteration {}", iteration + 1),
            start,
            performed_swipes,
            frames.len() as u32,
            config.max_swipes,
            Some(ProgressMetrics {
                bottom_top_similarity: check.bottom_top_similarity,
                full_similarity: check.full_similarity,
                estimated_motion_px: check.estimated_motion_px,
                overlap_similarity: check.overlap_similarity,
                low_motion_candidate: check.low_motion_candidate,
            }),
            Some(&curr),
        );

        if check.should_stop {
            stop_reason = check.reason;
            log.log(LogLevel::Info, &format!("stopping capture: {stop_reason}"));
            break;
        }

        if check.low_motion_candidate {
            low_motion_hits += 1;
            log.log(
                LogLevel::Debug,
                &format!(
                    "low-motion candidate detected ({low_motion_hits}/{})",
                    config.low_motion_consecutive
                ),
            );
            if low_motion_hits >= config.low_motion_consecutive {
                stop_reason = format!(
                    "estimated motion <= {}px for {} consecutive frames",
                    config.low_motion_px, config.low_motion_consecutive
                );
                log.log(LogLevel::Info, &format!("stopping capture: {stop_reason}"));
                break;
            }
        } else {
            low_motion_hits = 0;
        }

        frames.push(curr.clone());
        prev = curr;
    }

    emit_progress(
        progress,
        CapturePhase::Stopping,
        stop_reason.clone(),
        start,
        performed_swipes,
        frames.len() as u32,
        config.max_swipes,
        None,
        None,
    );

    let stitched = stitch_frames(&frames, config)?;
    let final_image = if config.circular_mask {
        DynamicImage::ImageRgba8(apply_circular_mask(&stitched))
    } else {
        DynamicImage::ImageRgb8(stitched)
    };
    let image_size = (final_image.width(), final_image.height());

    if let Some(parent) = config.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|source| CaptureError::Io { path: parent.to_path_buf(), source })?;
        }
    }
    final_image
        .save(&config.output_path)
        .map_err(|err| CaptureError::CaptureFailed {
            reason: format!("failed to write {}: {err}", config.output_path.display()),
        })?;

    log.log(
        LogLevel::Info,
        &format!(
            "saved stitched image: {} ({}x{})",
            config.output_path.display(),
            image_size.0,
            image_size.1
        ),
    );

    let result = CaptureResult {
        output_path: config.output_path.clone(),
        device_serial: serial,
        frames_captured: frames.len() as u32,
        swipes_performed: performed_swipes,
        stop_reason,
        image_size,
    };

    emit_progress(
        progress,
        CapturePhase::Complete,
        "capture complete".to_string(),
        start,
        result.swipes_performed,
        result.frames_captured,
        config.max_swipes,
        None,
        None,
    );

    Ok(result)
}

fn resolve_serial(bridge: &dyn DeviceBridge, preferred: Option<&str>) -> Result<String> {
    let online = bridge.list_online_serials()?;

    if let Some(preferred) = preferred {
        return if online.iter().any(|s| s == preferred) {
            Ok(preferred.to_string())
        } else {
            Err(CaptureError::DeviceNotFound {
                requested: Some(preferred.to_string()),
                online,
            })
        };
    }

    match online.len() {
        0 => Err(CaptureError::DeviceNotFound {
            requested: None,
            online,
        }),
        1 => Ok(online.into_iter().next().unwrap()),
        _ => Err(CaptureError::MultipleDevices { online }),
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
}

/// Sleeps for `delay_ms`, polling the cancel flag in slices of at most 50ms. Returns `true` if
/// cancellation was observed during the sleep.
fn sleep_with_cancel(delay_ms: u64, cancel: Option<&AtomicBool>) -> bool {
    if delay_ms == 0 {
        return is_cancelled(cancel);
    }
    let mut remaining = Duration::from_millis(delay_ms);
    loop {
        if is_cancelled(cancel) {
            return true;
        }
        if remaining.is_zero() {
            return is_cancelled(cancel);
        }
        let step = remaining.min(CANCEL_POLL_SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_progress(
    progress: &dyn ProgressSink,
    phase: CapturePhase,
    message: String,
    start: Instant,
    swipes_performed: u32,
    frames_captured: u32,
    max_swipes: u32,
    metrics: Option<ProgressMetrics>,
    frame: Option<&RgbImage>,
) {
    progress.on_progress(&CaptureProgress {
        phase,
        message,
        elapsed_sec: start.elapsed().as_secs_f64(),
        swipes_performed,
        frames_captured,
        max_swipes,
        metrics,
        thumbnail: frame.map(make_thumbnail),
    });
}
