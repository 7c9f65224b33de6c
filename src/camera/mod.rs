//! Camera access
//!
//! [`CameraDevice`] is the platform boundary: negotiate constraints, expose
//! the latest frame of the live stream, stop the stream. Everything above it
//! works against [`source::FrameSource`], which adds the constraint ladder,
//! device exclusivity, and bounded waits.

pub mod arbiter;
pub mod file;
pub mod ladder;
pub mod source;

pub use arbiter::{DeviceArbiter, DeviceLease, SharedDevice};
pub use file::ImageSequenceCamera;
pub use ladder::ConstraintLadder;
pub use source::{AcquireTiming, FrameSource};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CameraError;
use crate::models::Frame;

/// Which way the camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera
    #[default]
    Environment,
    /// Front camera
    User,
}

/// Requested stream size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One rung of the acquisition ladder; `None` fields are unconstrained
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Constraints {
    /// Exact device id
    pub device_id: Option<String>,
    pub facing: Option<Facing>,
    pub resolution: Option<Resolution>,
}

impl Constraints {
    /// Any camera at all
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution::new(width, height));
        self
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = &self.device_id {
            parts.push(format!("device={id}"));
        }
        if let Some(facing) = self.facing {
            parts.push(format!("facing={facing:?}").to_lowercase());
        }
        if let Some(r) = self.resolution {
            parts.push(format!("{}x{}", r.width, r.height));
        }
        if parts.is_empty() {
            f.write_str("any")
        } else {
            f.write_str(&parts.join(","))
        }
    }
}

/// An enumerated video input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

impl DeviceInfo {
    /// Build from a platform label, falling back to `Camera N` (1-based)
    pub fn new(id: impl Into<String>, label: Option<&str>, index: usize) -> Self {
        let label = match label.map(str::trim) {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => format!("Camera {}", index + 1),
        };
        Self {
            id: id.into(),
            label,
        }
    }
}

/// What an open stream actually delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub device_id: String,
    pub width: u32,
    pub height: u32,
}

/// Platform camera boundary
#[async_trait]
pub trait CameraDevice: Send {
    /// Available video inputs
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError>;

    /// Start a stream satisfying `constraints`
    async fn open(&mut self, constraints: &Constraints) -> Result<StreamInfo, CameraError>;

    /// Most recent frame of the open stream, if any
    fn latest_frame(&mut self) -> Option<Frame>;

    /// Stop the stream; a no-op when nothing is open
    fn close(&mut self);
}
