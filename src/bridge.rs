//! Device bridge adapter (§6): shells out to an `adb`-compatible binary to capture screens and
//! drive swipes. Kept as a plain, synchronous trait — the engine's control loop is single
//! threaded and blocking end to end.

use crate::error::{CaptureError, Result};
use crate::progress::{LogLevel, LogSink, NullSink};
use image::{Rgb, RgbImage};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Which byte-buffer variant a screenshot payload was successfully decoded from. Logged at debug
/// granularity so a field report of "adb output looked corrupt but it worked" can say why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeAttempt {
    Raw,
    SignatureSliced,
    CrlfNormalized,
    CrlfNormalizedSignatureSliced,
}

impl DecodeAttempt {
    fn describe(self) -> &'static str {
        match self {
            DecodeAttempt::Raw => "raw payload",
            DecodeAttempt::SignatureSliced => "payload sliced at PNG signature",
            DecodeAttempt::CrlfNormalized => "CRLF-normalized payload",
            DecodeAttempt::CrlfNormalizedSignatureSliced => {
                "CRLF-normalized payload sliced at PNG signature"
            }
        }
    }
}

pub trait DeviceBridge: Send + Sync {
    fn is_available(&self) -> bool;
    fn list_online_serials(&self) -> Result<Vec<String>>;
    fn capture_screen(&self, serial: &str) -> Result<RgbImage>;
    fn swipe(&self, serial: &str, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> Result<()>;
}

/// Drives a real device (or emulator) through an `adb`-compatible CLI.
pub struct AdbBridge {
    adb_path: String,
    timeout: Duration,
    log: Arc<dyn LogSink>,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout: Duration::from_secs(15),
            log: Arc::new(NullSink),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches a sink that receives a debug-level record of which screenshot decode fallback
    /// succeeded, so field reports can explain why a capture worked despite mangled adb output.
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    fn run(&self, serial: Option<&str>, args: &[&str]) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.adb_path);
        if let Some(serial) = serial {
            command.arg("-s").arg(serial);
        }
        command.args(args);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = command
            .spawn()
            .map_err(|_| CaptureError::BridgeUnavailable {
                binary: self.adb_path.clone(),
            })?;

        let (stdout, stderr, status) = self.wait_with_timeout(child, args)?;

        if !status.success() {
            let err = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(CaptureError::CaptureFailed {
                reason: format!("adb {} failed: {err}", args.join(" ")),
            });
        }
        Ok(stdout)
    }

    /// Runs the child to completion on a worker thread; if `self.timeout` elapses first, sends
    /// `SIGKILL` to the child by pid so a wedged `adb` process never lingers as an orphan — the
    /// worker thread's own `child.wait()` then unblocks and the thread exits on its own, even
    /// though this call has already given up on it.
    fn wait_with_timeout(
        &self,
        mut child: Child,
        args: &[&str],
    ) -> Result<(Vec<u8>, Vec<u8>, std::process::ExitStatus)> {
        let pid = child.id();
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stdout);
            }
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stderr);
            }
            let status = child.wait();
            let _ = tx.send((stdout, stderr, status));
        });

        match rx.recv_timeout(self.timeout) {
            Ok((stdout, stderr, Ok(status))) => Ok((stdout, stderr, status)),
            Ok((_, _, Err(err))) => Err(CaptureError::CaptureFailed {
                reason: format!("failed to wait on adb {}: {err}", args.join(" ")),
            }),
            Err(_) => {
                // SAFETY: pid was read from the live Child before it was moved into the worker
                // thread above; sending SIGKILL is safe even if the process has already exited.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGKILL);
                }
                Err(CaptureError::CaptureFailed {
                    reason: format!(
                        "adb {} timed out after {:.0}s and was killed",
                        args.join(" "),
                        self.timeout.as_secs_f32()
                    ),
                })
            }
        }
    }

    /// Tries the raw payload, the PNG-signature-sliced payload, and CRLF-normalized variants of
    /// both, in that order, decoding each with the `image` crate until one succeeds. Logs which
    /// attempt won at debug granularity.
    fn decode_screenshot(&self, raw: &[u8]) -> Result<RgbImage> {
        if raw.is_empty() {
            return Err(CaptureError::CaptureFailed {
                reason: "received empty screenshot data from adb".to_string(),
            });
        }

        let sig_pos = find_subslice(raw, PNG_SIGNATURE);
        let mut candidates: Vec<(DecodeAttempt, Vec<u8>)> = vec![(DecodeAttempt::Raw, raw.to_vec())];
        if let Some(pos) = sig_pos {
            if pos > 0 {
                candidates.push((DecodeAttempt::SignatureSliced, raw[pos..].to_vec()));
            }
        }
        candidates.push((DecodeAttempt::CrlfNormalized, normalize_crlf(raw)));
        if let Some(pos) = sig_pos {
            if pos > 0 {
                candidates.push((
                    DecodeAttempt::CrlfNormalizedSignatureSliced,
                    normalize_crlf(&raw[pos..]),
                ));
            }
        }

        for (attempt, candidate) in &candidates {
            if let Ok(img) = image::load_from_memory_with_format(candidate, image::ImageFormat::Png) {
                self.log.log(
                    LogLevel::Debug,
                    &format!("decoded screenshot via {}", attempt.describe()),
                );
                return Ok(img.to_rgb8());
            }
        }

        Err(CaptureError::CaptureFailed {
            reason: "failed to decode screenshot data from adb output".to_string(),
        })
    }
}

impl DeviceBridge for AdbBridge {
    fn is_available(&self) -> bool {
        self.run(None, &["version"]).is_ok()
    }

    fn list_online_serials(&self) -> Result<Vec<String>> {
        let out = self.run(None, &["devices", "-l"])?;
        let text = String::from_utf8_lossy(&out);
        let serials = text
            .lines()
            .skip(1)
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                let mut parts = line.splitn(3, char::is_whitespace);
                let serial = parts.next()?;
                let state = parts.next().unwrap_or("unknown");
                (state == "device").then(|| serial.to_string())
            })
            .collect();
        Ok(serials)
    }

    fn capture_screen(&self, serial: &str) -> Result<RgbImage> {
        let raw = self.run(Some(serial), &["exec-out", "screencap", "-p"])?;
        self.decode_screenshot(&raw)
    }

    fn swipe(&self, serial: &str, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> Result<()> {
        self.run(
            Some(serial),
            &[
                "shell",
                "input",
                "swipe",
                &x1.to_string(),
                &y1.to_string(),
                &x2.to_string(),
                &y2.to_string(),
                &duration_ms.to_string(),
            ],
        )?;
        Ok(())
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn normalize_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// A synthetic bridge that performs no real device I/O: each capture renders a deterministic
/// scrolling pattern one swipe further down, so `--mock` gives smoke tests something real to
/// detect termination on instead of a single static frame.
pub struct MockBridge {
    width: u32,
    height: u32,
    offset: AtomicU32,
    serial: Mutex<String>,
}

impl MockBridge {
    pub fn single_frame(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            offset: AtomicU32::new(0),
            serial: Mutex::new("mock-device".to_string()),
        }
    }

    fn render(&self, y_offset: u32) -> RgbImage {
        let mut frame = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            let world_y = y + y_offset;
            for x in 0..self.width {
                let r = ((x * 3 + world_y * 5) % 256) as u8;
                let g = ((x * 7 + world_y * 2) % 256) as u8;
                let b = ((x * 11 + world_y * 13) % 256) as u8;
                frame.put_pixel(x, y, Rgb([r, g, b]));
            }
        }
        frame
    }
}

impl DeviceBridge for MockBridge {
    fn is_available(&self) -> bool {
        true
    }

    fn list_online_serials(&self) -> Result<Vec<String>> {
        Ok(vec![self.serial.lock().unwrap().clone()])
    }

    fn capture_screen(&self, _serial: &str) -> Result<RgbImage> {
        Ok(self.render(self.offset.load(Ordering::SeqCst)))
    }

    fn swipe(&self, _serial: &str, _x1: i64, _y1: i64, _x2: i64, _y2: i64, _duration_ms: u64) -> Result<()> {
        self.offset.fetch_add(self.height / 4, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_empty_payload() {
        assert!(AdbBridge::new("adb").decode_screenshot(&[]).is_err());
    }

    #[test]
    fn decode_recovers_signature_sliced_png() {
        let frame = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let mut png = Vec::new();
        frame
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut garbled = vec![0u8, 1, 2, 3];
        garbled.extend_from_slice(&png);
        let decoded = AdbBridge::new("adb").decode_screenshot(&garbled).unwrap();
        assert_eq!(decoded.dimensions(), frame.dimensions());
    }

    #[test]
    fn decode_recovers_crlf_normalized_png() {
        let frame = RgbImage::from_pixel(3, 3, image::Rgb([5, 5, 5]));
        let mut png = Vec::new();
        frame
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let mangled: Vec<u8> = png
            .iter()
            .flat_map(|&b| if b == b'\n' { vec![b'\r', b'\n'] } else { vec![b] })
            .collect();
        let decoded = AdbBridge::new("adb").decode_screenshot(&mangled).unwrap();
        assert_eq!(decoded.dimensions(), frame.dimensions());
    }

    #[test]
    fn list_online_serials_filters_non_device_states() {
        let text = "List of devices attached\nemulator-5554\tdevice\nXYZ\toffline\n";
        let serials: Vec<String> = text
            .lines()
            .skip(1)
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                let mut parts = line.splitn(3, char::is_whitespace);
                let serial = parts.next()?;
                let state = parts.next().unwrap_or("unknown");
                (state == "device").then(|| serial.to_string())
            })
            .collect();
        assert_eq!(serials, vec!["emulator-5554".to_string()]);
    }
}
