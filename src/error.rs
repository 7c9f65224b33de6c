//! Error types for the scanning core.
//!
//! Resource errors ([`CameraError`]) are surfaced to the caller. Decode errors
//! ([`DecodeError`]) are recovered inside a tick and never propagate past the
//! backend chain. Pipeline errors ([`PipelineError`]) abort the current tick
//! only.

use thiserror::Error;

/// Camera acquisition failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The user or platform refused access to the camera
    #[error("camera permission denied")]
    PermissionDenied,

    /// No device matched the request
    #[error("camera device not found")]
    DeviceNotFound,

    /// The device is held by another consumer or process
    #[error("camera device is busy; close other apps using the camera or reload")]
    DeviceBusy,

    /// The device exists but cannot satisfy the requested constraints
    #[error("camera cannot satisfy the requested constraints")]
    ConstraintsUnsatisfiable,

    /// Negotiation did not finish within the attempt timeout
    #[error("camera negotiation timed out")]
    Timeout,

    /// Platform-specific failure not covered above
    #[error("camera backend error: {0}")]
    Backend(String),
}

impl CameraError {
    /// Short stable reason used in status strings
    pub fn reason(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => "permission-denied",
            CameraError::DeviceNotFound => "device-not-found",
            CameraError::DeviceBusy => "device-busy",
            CameraError::ConstraintsUnsatisfiable => "constraints-unsatisfiable",
            CameraError::Timeout => "timeout",
            CameraError::Backend(_) => "backend",
        }
    }

    /// Whether retrying with other constraints cannot help and the user should
    /// retry later or reload.
    pub fn recovery_advised(&self) -> bool {
        matches!(self, CameraError::DeviceBusy)
    }
}

/// Degenerate input handed to the per-frame pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("frame has zero width or height")]
    EmptyFrame,

    #[error("pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("region {x},{y} {width}x{height} lies outside the frame")]
    RegionOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("tick processing panicked")]
    Panicked,
}

/// A single backend call that produced nothing usable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{backend} failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} panicked while decoding")]
    Panicked { backend: &'static str },
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures handing a session to a history sink
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history records could not be encoded: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("history sink rejected the session: {0}")]
    Rejected(String),
}

/// Top-level error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("no frame available yet")]
    FrameUnavailable,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("scanner is already running")]
    AlreadyRunning,

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Alias used throughout the crate
pub type Result<T> = std::result::Result<T, ScanError>;
