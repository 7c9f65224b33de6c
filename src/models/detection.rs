use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Quad, ScanRegion};

/// Speed/robustness class of a decode backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    /// Single well-centered symbol per call, low latency
    FastSingle,
    /// Several symbols per call, tolerant of noise, higher latency
    RobustMulti,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::FastSingle => write!(f, "fast-single"),
            BackendKind::RobustMulti => write!(f, "robust-multi"),
        }
    }
}

/// Unconfirmed decode result from one backend on one region
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCandidate {
    /// Decoded payload
    pub payload: String,
    /// Region the backend was fed
    pub region: ScanRegion,
    /// Backend class that produced it
    pub backend: BackendKind,
    /// Backend name, e.g. `rqrr`
    pub backend_name: &'static str,
    /// Backend-reported confidence in [0, 1]
    pub raw_confidence: f32,
    /// Symbol location in frame coordinates, when the backend reports one
    pub location: Option<Quad>,
}

/// A confirmed, unique payload recorded in a scan session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedCode {
    /// Stable identifier
    pub id: Uuid,
    /// Decoded payload
    pub payload: String,
    /// Capture time of the frame it was first confirmed on
    pub first_detected: DateTime<Utc>,
    /// 1-based order of confirmation within the session
    pub sequence: u64,
    /// Confidence at promotion time
    pub confidence: f32,
    /// Backend class that produced the promoted candidate
    pub backend: BackendKind,
}
