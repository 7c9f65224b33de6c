use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::DetectedCode;

/// Status reported to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Idle,
    Starting,
    Scanning,
    Stopping,
    Stopped,
    Error {
        reason: String,
        /// Retrying with other constraints will not help; retry later or reload
        recovery_advised: bool,
    },
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Idle => f.write_str("idle"),
            ScanStatus::Starting => f.write_str("starting"),
            ScanStatus::Scanning => f.write_str("scanning"),
            ScanStatus::Stopping => f.write_str("stopping"),
            ScanStatus::Stopped => f.write_str("stopped"),
            ScanStatus::Error { reason, .. } => write!(f, "error: {reason}"),
        }
    }
}

/// Everything a controller reports, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A payload entered the session
    Detected(DetectedCode),
    /// A payload already in the session was seen again
    Duplicate {
        payload: String,
        observed_at: DateTime<Utc>,
    },
    Status(ScanStatus),
    /// Beep/flash cue, at most once per debounce window
    Feedback { payload: String },
    /// The session was emptied
    Cleared,
    /// One code was removed from the session
    Removed(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        assert_eq!(ScanStatus::Scanning.to_string(), "scanning");
        assert_eq!(ScanStatus::Stopped.to_string(), "stopped");
        let err = ScanStatus::Error {
            reason: "device-busy".into(),
            recovery_advised: true,
        };
        assert_eq!(err.to_string(), "error: device-busy");
    }
}
