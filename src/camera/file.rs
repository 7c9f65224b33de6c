//! Replays still images as a camera stream

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{CameraDevice, Constraints, DeviceInfo, Facing, StreamInfo};
use crate::error::CameraError;
use crate::models::Frame;
use crate::tools;

/// A fake camera backed by a list of frames
///
/// The stream reports `Facing::Environment`. A resolution constraint only
/// matches when every frame has exactly that size, and a device id must
/// equal this camera's id.
#[derive(Debug, Clone)]
pub struct ImageSequenceCamera {
    info: DeviceInfo,
    frames: Vec<Frame>,
    looping: bool,
    cursor: usize,
    open: bool,
}

impl ImageSequenceCamera {
    pub fn new(id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            info: DeviceInfo::new(id, None, 0),
            frames,
            looping: true,
            cursor: 0,
            open: false,
        }
    }

    /// Every image in `dir`, sorted by file name
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CameraError::DeviceNotFound);
        }
        let mut frames = Vec::new();
        for path in tools::dataset_iter(dir, None, false) {
            match tools::load_frame(&path) {
                Ok(frame) => frames.push(frame),
                Err(err) => debug!(path = %path.display(), error = %err, "image skipped"),
            }
        }
        if frames.is_empty() {
            return Err(CameraError::DeviceNotFound);
        }
        Ok(Self::new(format!("file:{}", dir.display()), frames))
    }

    /// Stop after the last frame instead of starting over
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.info.label = label.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn satisfies(&self, constraints: &Constraints) -> Result<(), CameraError> {
        if let Some(id) = &constraints.device_id {
            if *id != self.info.id {
                return Err(CameraError::DeviceNotFound);
            }
        }
        if constraints.facing == Some(Facing::User) {
            return Err(CameraError::ConstraintsUnsatisfiable);
        }
        if let Some(r) = constraints.resolution {
            let fits = self
                .frames
                .iter()
                .all(|f| f.width() == r.width as usize && f.height() == r.height as usize);
            if !fits {
                return Err(CameraError::ConstraintsUnsatisfiable);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CameraDevice for ImageSequenceCamera {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        Ok(vec![self.info.clone()])
    }

    async fn open(&mut self, constraints: &Constraints) -> Result<StreamInfo, CameraError> {
        if self.frames.is_empty() {
            return Err(CameraError::DeviceNotFound);
        }
        self.satisfies(constraints)?;
        self.open = true;
        self.cursor = 0;
        let first = &self.frames[0];
        Ok(StreamInfo {
            device_id: self.info.id.clone(),
            width: first.width() as u32,
            height: first.height() as u32,
        })
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        if !self.open || self.frames.is_empty() {
            return None;
        }
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let frame = self.frames[self.cursor].clone().with_timestamp(Utc::now());
        self.cursor += 1;
        Some(frame)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> ImageSequenceCamera {
        let a = Frame::from_luma(4, 2, vec![0; 8]).unwrap();
        let b = Frame::from_luma(4, 2, vec![255; 8]).unwrap();
        ImageSequenceCamera::new("seq", vec![a, b])
    }

    #[tokio::test]
    async fn honours_device_and_resolution() {
        let mut cam = camera();
        let wrong_device = Constraints::any().with_device("other");
        assert_eq!(cam.open(&wrong_device).await.unwrap_err(), CameraError::DeviceNotFound);
        let wrong_size = Constraints::any().with_resolution(640, 480);
        assert_eq!(
            cam.open(&wrong_size).await.unwrap_err(),
            CameraError::ConstraintsUnsatisfiable
        );
        let exact = Constraints::any().with_device("seq").with_resolution(4, 2);
        assert_eq!(cam.open(&exact).await.unwrap().width, 4);
    }

    #[tokio::test]
    async fn frames_only_flow_while_open() {
        let mut cam = camera().once();
        assert!(cam.latest_frame().is_none());
        cam.open(&Constraints::any()).await.unwrap();
        assert_eq!(cam.latest_frame().unwrap().pixels()[0], 0);
        assert_eq!(cam.latest_frame().unwrap().pixels()[0], 255);
        assert!(cam.latest_frame().is_none());
        cam.close();
        assert!(cam.latest_frame().is_none());
    }

    #[tokio::test]
    async fn looping_restarts_sequence() {
        let mut cam = camera();
        cam.open(&Constraints::any()).await.unwrap();
        for _ in 0..2 {
            cam.latest_frame().unwrap();
        }
        assert_eq!(cam.latest_frame().unwrap().pixels()[0], 0);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ImageSequenceCamera::from_dir(dir.path().join("nope")).unwrap_err(),
            CameraError::DeviceNotFound
        );
        assert_eq!(
            ImageSequenceCamera::from_dir(dir.path()).unwrap_err(),
            CameraError::DeviceNotFound
        );
    }
}
