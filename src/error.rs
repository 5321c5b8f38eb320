use std::path::PathBuf;

/// Typed error kinds surfaced by the capture core (see crate-level docs for the full contract).
///
/// Validation, device-resolution, and bridge errors are fatal before the capture loop starts.
/// `CaptureFailed` can also occur mid-loop, in which case the partial frame buffer is discarded.
/// `InvalidArgument` indicates a programming bug (mismatched similarity shapes, empty stitch
/// input) rather than a runtime condition a caller can recover from.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("invalid config: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("bridge unavailable: {binary} was not found or did not respond")]
    BridgeUnavailable { binary: String },

    #[error("device not found: requested {requested:?}, online devices: {online:?}")]
    DeviceNotFound {
        requested: Option<String>,
        online: Vec<String>,
    },

    #[error("multiple devices online ({online:?}) and no serial was specified")]
    MultipleDevices { online: Vec<String> },

    #[error("capture failed: {reason}")]
    CaptureFailed { reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        CaptureError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
