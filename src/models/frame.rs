use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::utils::grayscale::{rgb_to_grayscale, rgba_to_grayscale};

use super::ScanRegion;

/// Pixel layout of a [`Frame`] buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// One luminance byte per pixel
    Luma8,
    /// Packed R, G, B bytes
    Rgb8,
    /// Packed R, G, B, A bytes
    Rgba8,
}

impl PixelFormat {
    /// Bytes used by a single pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Number of leading colour channels (alpha excluded)
    pub fn color_channels(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => 3,
        }
    }
}

/// Immutable camera frame
///
/// Produced once per tick by the frame source and dropped when the tick
/// finishes. Transformations build a new frame that keeps the capture
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap a pixel buffer. The buffer length must match the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        // dimensions too large to address report as an unsatisfiable size
        let expected = width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
            .unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(PipelineError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            captured_at,
        })
    }

    /// Luminance frame captured now
    pub fn from_luma(width: usize, height: usize, data: Vec<u8>) -> Result<Self, PipelineError> {
        Self::new(width, height, PixelFormat::Luma8, data, Utc::now())
    }

    /// RGB frame captured now
    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self, PipelineError> {
        Self::new(width, height, PixelFormat::Rgb8, data, Utc::now())
    }

    /// Same frame with a different capture timestamp
    pub fn with_timestamp(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Build a frame with the same dimensions and timestamp but new pixels
    pub fn with_pixels(&self, format: PixelFormat, data: Vec<u8>) -> Result<Self, PipelineError> {
        Self::new(self.width, self.height, format, data, self.captured_at)
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel layout
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame and return its pixel bytes
    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }

    /// Capture timestamp
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whole-frame rectangle
    pub fn bounds(&self) -> super::Rect {
        super::Rect::new(0, 0, self.width, self.height)
    }

    /// Luminance plane, borrowed when the frame is already single-channel
    pub fn luma(&self) -> Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Luma8 => Cow::Borrowed(&self.data),
            PixelFormat::Rgb8 => Cow::Owned(rgb_to_grayscale(&self.data, self.width, self.height)),
            PixelFormat::Rgba8 => {
                Cow::Owned(rgba_to_grayscale(&self.data, self.width, self.height))
            }
        }
    }

    /// Copy the luminance of a region into its own plane
    pub fn crop_luma(&self, region: &ScanRegion) -> Result<LumaPlane, PipelineError> {
        LumaPlane::new(&self.luma(), self.width, self.height).crop(region)
    }
}

/// Owned single-channel image handed to decode backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaPlane {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Row-major luminance bytes
    pub data: Vec<u8>,
}

impl LumaPlane {
    /// Copy a full luminance buffer
    pub fn new(data: &[u8], width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: data[..width * height].to_vec(),
        }
    }

    /// Luminance at (x, y); out-of-range reads return white
    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 255;
        }
        self.data[y * self.width + x]
    }

    /// Copy the pixels covered by `region`
    pub fn crop(&self, region: &ScanRegion) -> Result<LumaPlane, PipelineError> {
        let r = region.rect;
        if r.width == 0 || r.height == 0 || r.right() > self.width || r.bottom() > self.height {
            return Err(PipelineError::RegionOutOfBounds {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
            });
        }
        if r.x == 0 && r.y == 0 && r.width == self.width && r.height == self.height {
            return Ok(self.clone());
        }
        let mut data = Vec::with_capacity(r.width * r.height);
        for y in r.y..r.bottom() {
            let start = y * self.width + r.x;
            data.extend_from_slice(&self.data[start..start + r.width]);
        }
        Ok(LumaPlane {
            width: r.width,
            height: r.height,
            data,
        })
    }
}
