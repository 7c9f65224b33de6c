//! Exclusive use of the physical camera
//!
//! Every consumer that may open the camera shares one [`DeviceArbiter`] and
//! registers its device handle when it acquires. Acquiring closes the
//! previous holder's device before the new consumer opens its own, so at most
//! one handle is live. The revoked holder notices on its next frame request.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::CameraDevice;

/// Device handle shared between its consumer and the arbiter
pub type SharedDevice = Arc<tokio::sync::Mutex<Box<dyn CameraDevice>>>;

#[derive(Default)]
struct Holder {
    generation: u64,
    consumer: Option<String>,
    revoked: Option<Arc<AtomicBool>>,
    device: Option<SharedDevice>,
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("generation", &self.generation)
            .field("consumer", &self.consumer)
            .finish()
    }
}

/// Shared handle deciding who owns the camera
#[derive(Debug, Clone, Default)]
pub struct DeviceArbiter {
    holder: Arc<Mutex<Holder>>,
}

impl DeviceArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Holder> {
        self.holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the camera for `consumer`, closing the current holder's device
    pub async fn acquire(&self, consumer: &str, device: &SharedDevice) -> DeviceLease {
        let (lease, previous) = {
            let mut holder = self.lock();
            if let Some(flag) = holder.revoked.take() {
                flag.store(true, Ordering::Release);
                debug!(
                    previous = holder.consumer.as_deref().unwrap_or("?"),
                    next = consumer,
                    "camera lease revoked"
                );
            }
            let previous = holder.device.replace(device.clone());
            holder.generation += 1;
            let revoked = Arc::new(AtomicBool::new(false));
            holder.consumer = Some(consumer.to_string());
            holder.revoked = Some(revoked.clone());
            let lease = DeviceLease {
                arbiter: self.clone(),
                generation: holder.generation,
                revoked,
            };
            (lease, previous)
        };
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous, device) {
                previous.lock().await.close();
                debug!(next = consumer, "previous holder's camera closed");
            }
        }
        lease
    }

    /// Current holder, if any
    pub fn holder(&self) -> Option<String> {
        self.lock().consumer.clone()
    }

    pub fn is_held(&self) -> bool {
        self.lock().consumer.is_some()
    }

    fn release(&self, generation: u64) {
        let mut holder = self.lock();
        if holder.generation == generation {
            holder.consumer = None;
            holder.revoked = None;
            holder.device = None;
        }
    }
}

/// Proof of camera ownership; released on drop
#[derive(Debug)]
pub struct DeviceLease {
    arbiter: DeviceArbiter,
    generation: u64,
    revoked: Arc<AtomicBool>,
}

impl DeviceLease {
    /// False once another consumer acquired the camera
    pub fn is_active(&self) -> bool {
        !self.revoked.load(Ordering::Acquire)
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.arbiter.release(self.generation);
    }
}
