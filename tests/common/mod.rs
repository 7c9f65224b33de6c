#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qrcode::{Color, QrCode};
use rust_qr_live::backend::{BackendChain, DecodeBackend, Decoded};
use rust_qr_live::camera::{
    AcquireTiming, CameraDevice, Constraints, DeviceArbiter, DeviceInfo, FrameSource,
    ImageSequenceCamera, StreamInfo,
};
use rust_qr_live::error::{CameraError, DecodeError};
use rust_qr_live::models::{BackendKind, LumaPlane};
use rust_qr_live::{Frame, ScanConfig, ScanController, ScanPipeline};

/// Paint `payload` as a QR code into a grayscale buffer
pub fn draw_qr(data: &mut [u8], width: usize, payload: &str, x: usize, y: usize, module: usize) {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let side = code.width();
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let (mx, my) = (i % side, i / side);
        for py in 0..module {
            for px in 0..module {
                data[(y + my * module + py) * width + x + mx * module + px] = 0;
            }
        }
    }
}

/// White frame with one QR code
pub fn qr_frame(payload: &str, width: usize, height: usize, x: usize, y: usize, module: usize) -> Frame {
    let mut data = vec![255u8; width * height];
    draw_qr(&mut data, width, payload, x, y, module);
    Frame::from_luma(width, height, data).unwrap()
}

pub fn to_rgb(frame: &Frame) -> Frame {
    let rgb: Vec<u8> = frame.pixels().iter().flat_map(|&v| [v, v, v]).collect();
    Frame::from_rgb(frame.width(), frame.height(), rgb).unwrap()
}

/// Config whose preferred camera resolution matches the frames, with no waits
pub fn test_config(width: usize, height: usize) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.camera.width = width as u32;
    config.camera.height = height as u32;
    config.camera.release_wait_ms = 0;
    config.camera.settle_delay_ms = 0;
    config
}

/// Single region covering the whole frame
pub fn full_frame_only(config: &mut ScanConfig) {
    config.partition.center_fraction = 1.0;
    config.partition.grid_size = 1;
    config.partition.include_full_frame = true;
    config.partition.min_region_side = 1;
}

pub fn controller(config: ScanConfig, frames: Vec<Frame>, chain: BackendChain) -> ScanController {
    let source = FrameSource::new(
        "test",
        Box::new(ImageSequenceCamera::new("seq", frames)),
        DeviceArbiter::new(),
        AcquireTiming::from_config(&config.camera),
    );
    let pipeline = ScanPipeline::with_backends(&config, chain);
    ScanController::new(config, source, pipeline)
}

/// Always returns the same payloads
pub struct Fixed {
    pub name: &'static str,
    pub kind: BackendKind,
    pub payloads: Vec<String>,
    pub confidence: f32,
}

impl Fixed {
    pub fn fast(payloads: &[&str]) -> Self {
        Self {
            name: "fixed-fast",
            kind: BackendKind::FastSingle,
            payloads: payloads.iter().map(|p| p.to_string()).collect(),
            confidence: 1.0,
        }
    }

    pub fn robust(payloads: &[&str]) -> Self {
        Self {
            name: "fixed-robust",
            kind: BackendKind::RobustMulti,
            ..Self::fast(payloads)
        }
    }
}

impl DecodeBackend for Fixed {
    fn name(&self) -> &'static str {
        self.name
    }
    fn kind(&self) -> BackendKind {
        self.kind
    }
    fn decode(&self, _image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
        Ok(self
            .payloads
            .iter()
            .map(|p| Decoded {
                payload: p.clone(),
                confidence: self.confidence,
                location: None,
            })
            .collect())
    }
}

/// Fails every call
pub struct Failing(pub BackendKind);

impl DecodeBackend for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }
    fn kind(&self) -> BackendKind {
        self.0
    }
    fn decode(&self, _image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
        Err(DecodeError::Backend {
            backend: "failing",
            message: "unreadable".into(),
        })
    }
}

/// Returns the next scripted payload list on each call
pub struct Script {
    pub calls: Mutex<VecDeque<Vec<String>>>,
}

impl Script {
    pub fn new(ticks: Vec<Vec<&str>>) -> Self {
        Self {
            calls: Mutex::new(
                ticks
                    .into_iter()
                    .map(|t| t.into_iter().map(String::from).collect())
                    .collect(),
            ),
        }
    }
}

impl DecodeBackend for Script {
    fn name(&self) -> &'static str {
        "script"
    }
    fn kind(&self) -> BackendKind {
        BackendKind::FastSingle
    }
    fn decode(&self, _image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
        let next = self.calls.lock().unwrap().pop_front().unwrap_or_default();
        Ok(next
            .into_iter()
            .map(|payload| Decoded {
                payload,
                confidence: 1.0,
                location: None,
            })
            .collect())
    }
}

/// Camera answering each open attempt from a script
///
/// Cameras sharing `live` model one physical device: opening fails with
/// `DeviceBusy` while another handle is still open.
pub struct ScriptedCamera {
    pub replies: VecDeque<Result<(), CameraError>>,
    pub attempts: Arc<Mutex<Vec<Constraints>>>,
    live: Arc<AtomicUsize>,
    open: bool,
}

impl ScriptedCamera {
    pub fn new(replies: Vec<Result<(), CameraError>>) -> Self {
        Self {
            replies: replies.into(),
            attempts: Default::default(),
            live: Default::default(),
            open: false,
        }
    }

    pub fn sharing(mut self, live: &Arc<AtomicUsize>) -> Self {
        self.live = live.clone();
        self
    }
}

#[async_trait]
impl CameraDevice for ScriptedCamera {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        Ok(vec![DeviceInfo::new("scripted", None, 0)])
    }

    async fn open(&mut self, constraints: &Constraints) -> Result<StreamInfo, CameraError> {
        self.attempts.lock().unwrap().push(constraints.clone());
        if !self.open && self.live.load(Ordering::SeqCst) > 0 {
            return Err(CameraError::DeviceBusy);
        }
        self.replies
            .pop_front()
            .unwrap_or(Err(CameraError::DeviceNotFound))?;
        if !self.open {
            self.live.fetch_add(1, Ordering::SeqCst);
        }
        self.open = true;
        Ok(StreamInfo {
            device_id: "scripted".into(),
            width: 64,
            height: 64,
        })
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        self.open
            .then(|| Frame::from_luma(64, 64, vec![255; 64 * 64]).unwrap())
    }

    fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
