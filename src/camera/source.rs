use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use std::sync::Arc;

use super::{
    CameraDevice, ConstraintLadder, DeviceArbiter, DeviceInfo, DeviceLease, SharedDevice, StreamInfo,
};
use crate::config::CameraConfig;
use crate::error::{CameraError, ScanError};
use crate::models::Frame;

/// Waits applied while negotiating a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireTiming {
    /// Between two ladder attempts
    pub settle_delay: Duration,
    /// After revoking the previous holder, before the first attempt
    pub release_wait: Duration,
    /// Upper bound for one attempt
    pub attempt_timeout: Duration,
}

impl AcquireTiming {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            release_wait: Duration::from_millis(config.release_wait_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

impl Default for AcquireTiming {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// A camera consumer with a negotiated stream
pub struct FrameSource {
    name: String,
    device: SharedDevice,
    arbiter: DeviceArbiter,
    timing: AcquireTiming,
    lease: Option<DeviceLease>,
    stream: Option<StreamInfo>,
    produced_frame: bool,
}

impl FrameSource {
    pub fn new(
        name: impl Into<String>,
        device: Box<dyn CameraDevice>,
        arbiter: DeviceArbiter,
        timing: AcquireTiming,
    ) -> Self {
        Self {
            name: name.into(),
            device: Arc::new(tokio::sync::Mutex::new(device)),
            arbiter,
            timing,
            lease: None,
            stream: None,
            produced_frame: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timing(&self) -> AcquireTiming {
        self.timing
    }

    /// Stream negotiated by the last successful [`FrameSource::acquire`]
    pub fn stream(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    /// True while a stream is open and the lease has not been revoked
    pub fn is_active(&self) -> bool {
        self.stream.is_some() && self.lease.as_ref().is_some_and(DeviceLease::is_active)
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        self.device.lock().await.list_devices().await
    }

    /// Open the camera, walking `ladder` until a level succeeds
    ///
    /// Any previous holder is revoked and its device closed first, then
    /// `release_wait` elapses before the first attempt. Permission denial ends the walk immediately. When
    /// every level fails the error is `DeviceBusy` if any level reported it,
    /// otherwise the last error seen.
    #[instrument(skip_all, fields(source = %self.name, levels = ladder.len()))]
    pub async fn acquire(&mut self, ladder: &ConstraintLadder) -> Result<StreamInfo, CameraError> {
        self.release();
        if ladder.is_empty() {
            return Err(CameraError::ConstraintsUnsatisfiable);
        }

        let lease = self.arbiter.acquire(&self.name, &self.device).await;
        sleep(self.timing.release_wait).await;

        let mut saw_busy = false;
        let mut last_error = CameraError::ConstraintsUnsatisfiable;
        for (attempt, level) in ladder.iter().enumerate() {
            if attempt > 0 {
                sleep(self.timing.settle_delay).await;
            }
            debug!(attempt, constraints = %level, "opening camera");
            let device = self.device.clone();
            let attempt_open = async move {
                let mut guard = device.lock().await;
                guard.open(level).await
            };
            let error = match timeout(self.timing.attempt_timeout, attempt_open).await {
                Ok(Ok(stream)) => {
                    info!(
                        attempt,
                        device = %stream.device_id,
                        width = stream.width,
                        height = stream.height,
                        "camera acquired"
                    );
                    self.lease = Some(lease);
                    self.stream = Some(stream.clone());
                    self.produced_frame = false;
                    return Ok(stream);
                }
                Ok(Err(err)) => err,
                Err(_) => CameraError::Timeout,
            };
            self.device.lock().await.close();
            debug!(attempt, error = %error, "camera attempt failed");
            if error == CameraError::PermissionDenied {
                warn!("camera permission denied");
                return Err(error);
            }
            saw_busy |= error == CameraError::DeviceBusy;
            last_error = error;
        }

        let error = if saw_busy {
            CameraError::DeviceBusy
        } else {
            last_error
        };
        warn!(error = %error, "camera acquisition failed at every level");
        Err(error)
    }

    /// Stop the stream and give up the lease
    pub fn release(&mut self) {
        if self.stream.take().is_some() {
            debug!(source = %self.name, "camera released");
        }
        match self.device.try_lock() {
            Ok(mut device) => device.close(),
            // only the arbiter locks it from outside, and it is closing it
            Err(_) => debug!(source = %self.name, "device busy closing"),
        }
        self.lease = None;
        self.produced_frame = false;
    }

    /// Latest frame of the stream
    ///
    /// Unavailable until the stream delivered a frame with nonzero dimensions,
    /// and whenever no stream is open. Once the lease is revoked the stream
    /// is forgotten.
    pub fn current_frame(&mut self) -> Result<Frame, ScanError> {
        if self.stream.is_none() {
            return Err(ScanError::FrameUnavailable);
        }
        if !self.lease.as_ref().is_some_and(DeviceLease::is_active) {
            debug!(source = %self.name, "lease revoked, closing stream");
            self.release();
            return Err(ScanError::FrameUnavailable);
        }
        let frame = self
            .device
            .try_lock()
            .ok()
            .and_then(|mut device| device.latest_frame())
            .ok_or(ScanError::FrameUnavailable)?;
        if !self.produced_frame {
            if frame.is_empty() {
                return Err(ScanError::FrameUnavailable);
            }
            self.produced_frame = true;
        }
        Ok(frame)
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("name", &self.name)
            .field("stream", &self.stream)
            .field("active", &self.is_active())
            .finish()
    }
}
