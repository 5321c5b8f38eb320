use anyhow::{Context, Result};
use clap::Parser;
use scrollcap::{
    AdbBridge, CaptureConfig, CapturePhase, CaptureProgress, DeviceBridge, FileCaptureConfig,
    LogLevel, LogSink, MockBridge, ProgressSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Long-screenshot capture for small scrollable displays.
#[derive(Debug, Parser)]
#[command(name = "scrollcap")]
#[command(about = "Capture a long screenshot from a connected device and stitch it into one PNG")]
struct Cli {
    /// Destination PNG path.
    #[arg(long)]
    output: PathBuf,

    /// Optional TOML file seeding defaults before these flags are applied.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preferred device serial; auto-selects the sole online device if omitted.
    #[arg(long)]
    serial: Option<String>,

    /// Path to the adb-compatible binary.
    #[arg(long, default_value = "adb")]
    adb_path: String,

    /// Use a synthetic in-memory bridge instead of a real device, for smoke testing.
    #[arg(long)]
    mock: bool,

    #[arg(long)]
    simple_mode: Option<bool>,
    #[arg(long)]
    swipe_x1: Option<i64>,
    #[arg(long)]
    swipe_y1: Option<i64>,
    #[arg(long)]
    swipe_x2: Option<i64>,
    #[arg(long)]
    swipe_y2: Option<i64>,
    #[arg(long)]
    swipe_duration_ms: Option<u64>,
    #[arg(long)]
    scroll_delay_ms: Option<u64>,
    #[arg(long)]
    max_swipes: Option<u32>,
    #[arg(long)]
    similarity_threshold: Option<f64>,
    #[arg(long)]
    use_ssim: Option<bool>,
    #[arg(long)]
    stop_region_ratio: Option<f64>,
    #[arg(long)]
    low_motion_px: Option<u32>,
    #[arg(long)]
    low_motion_similarity: Option<f64>,
    #[arg(long)]
    low_motion_consecutive: Option<u32>,
    #[arg(long)]
    min_overlap_ratio: Option<f64>,
    #[arg(long)]
    max_overlap_ratio: Option<f64>,
    #[arg(long)]
    overlap_min_similarity: Option<f64>,
    #[arg(long)]
    downscale_width: Option<u32>,
    #[arg(long)]
    circular_mask: bool,
}

struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        let tag = match level {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        eprintln!("[{tag}] {message}");
    }
}

struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_progress(&self, progress: &CaptureProgress) {
        let phase = match progress.phase {
            CapturePhase::Initial => "initial",
            CapturePhase::Iteration => "iteration",
            CapturePhase::Stopping => "stopping",
            CapturePhase::Complete => "complete",
        };
        println!(
            "[{phase}] t={:.2}s swipes={}/{} frames={} {}",
            progress.elapsed_sec,
            progress.swipes_performed,
            progress.max_swipes,
            progress.frames_captured,
            progress.message
        );
    }
}

static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signum: libc::c_int) {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_sigint_handler() {
    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
    }
}

fn build_config(cli: &Cli) -> Result<CaptureConfig> {
    let base = match &cli.config {
        Some(path) => {
            let file = FileCaptureConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            file.apply_onto(CaptureConfig::default())
        }
        None => CaptureConfig::default(),
    };

    Ok(CaptureConfig {
        output_path: cli.output.clone(),
        serial: cli.serial.clone().or(base.serial),
        simple_mode: cli.simple_mode.unwrap_or(base.simple_mode),
        swipe_x1: cli.swipe_x1.or(base.swipe_x1),
        swipe_y1: cli.swipe_y1.or(base.swipe_y1),
        swipe_x2: cli.swipe_x2.or(base.swipe_x2),
        swipe_y2: cli.swipe_y2.or(base.swipe_y2),
        swipe_duration_ms: cli.swipe_duration_ms.unwrap_or(base.swipe_duration_ms),
        scroll_delay_ms: cli.scroll_delay_ms.unwrap_or(base.scroll_delay_ms),
        max_swipes: cli.max_swipes.unwrap_or(base.max_swipes),
        similarity_threshold: cli.similarity_threshold.unwrap_or(base.similarity_threshold),
        use_ssim: cli.use_ssim.unwrap_or(base.use_ssim),
        stop_region_ratio: cli.stop_region_ratio.unwrap_or(base.stop_region_ratio),
        low_motion_px: cli.low_motion_px.unwrap_or(base.low_motion_px),
        low_motion_similarity: cli
            .low_motion_similarity
            .unwrap_or(base.low_motion_similarity),
        low_motion_consecutive: cli
            .low_motion_consecutive
            .unwrap_or(base.low_motion_consecutive),
        min_overlap_ratio: cli.min_overlap_ratio.unwrap_or(base.min_overlap_ratio),
        max_overlap_ratio: cli.max_overlap_ratio.unwrap_or(base.max_overlap_ratio),
        overlap_min_similarity: cli
            .overlap_min_similarity
            .unwrap_or(base.overlap_min_similarity),
        downscale_width: cli.downscale_width.unwrap_or(base.downscale_width),
        circular_mask: cli.circular_mask || base.circular_mask,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    install_sigint_handler();

    let bridge: Arc<dyn DeviceBridge> = if cli.mock {
        eprintln!("NOTE: running with --mock (no real device I/O will occur).");
        Arc::new(MockBridge::single_frame(320, 640))
    } else {
        Arc::new(AdbBridge::new(cli.adb_path.clone()).with_log_sink(Arc::new(StderrLogSink)))
    };

    let log = StderrLogSink;
    let progress = StdoutProgressSink;

    let result = scrollcap::capture(
        &config,
        bridge.as_ref(),
        Some(&log),
        Some(&progress),
        Some(&CANCEL_REQUESTED),
    )
    .context("capture failed")?;

    println!(
        "saved {} ({}x{}) from {} after {} swipe(s), {} frame(s): {}",
        result.output_path.display(),
        result.image_size.0,
        result.image_size.1,
        result.device_serial,
        result.swipes_performed,
        result.frames_captured,
        result.stop_reason
    );

    Ok(())
}
