//! Frame preprocessing
//!
//! Stages run in a fixed order when enabled:
//!
//! 1. grayscale (colour frames collapse to a luminance plane)
//! 2. contrast around mid-gray
//! 3. 3x3 sharpening (skipped when edge enhancement is on)
//! 4. adaptive threshold
//! 5. edge enhancement
//!
//! Grayscale is mandatory when enabled; the remaining stages are dropped once
//! the per-frame time budget is spent.

pub mod filters;

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace};

use crate::config::PreprocessConfig;
use crate::error::PipelineError;
use crate::models::{Frame, PixelFormat};
use crate::utils::binarization::adaptive_threshold_into;
use crate::utils::grayscale::grayscale_into;
use crate::utils::memory_pool::BufferPool;

/// Identifies one preprocessing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Grayscale,
    Contrast,
    Sharpen,
    Threshold,
    EdgeEnhance,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Grayscale => "grayscale",
            Stage::Contrast => "contrast",
            Stage::Sharpen => "sharpen",
            Stage::Threshold => "threshold",
            Stage::EdgeEnhance => "edge-enhance",
        };
        f.pad(name)
    }
}

/// What happened to one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessReport {
    /// Stages that ran, with their duration
    pub applied: Vec<(Stage, Duration)>,
    /// Enabled stages dropped because the budget ran out
    pub skipped_for_budget: Vec<Stage>,
    /// Total time spent
    pub elapsed: Duration,
}

/// Applies the configured stages to frames
#[derive(Debug)]
pub struct Preprocessor {
    config: PreprocessConfig,
    pool: BufferPool,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            config,
            pool: BufferPool::new(),
        }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Transform a frame; dimensions and timestamp are preserved
    pub fn process(&mut self, frame: &Frame) -> Result<Frame, PipelineError> {
        self.process_with_report(frame).map(|(frame, _)| frame)
    }

    /// Like [`Preprocessor::process`], also reporting per-stage timings
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub fn process_with_report(
        &mut self,
        frame: &Frame,
    ) -> Result<(Frame, PreprocessReport), PipelineError> {
        if frame.is_empty() {
            return Err(PipelineError::EmptyFrame);
        }
        let mut report = PreprocessReport::default();
        if !self.config.enabled {
            return Ok((frame.clone(), report));
        }

        let started = Instant::now();
        let budget = self.config.budget();
        let (width, height) = (frame.width(), frame.height());
        let mut format = frame.format();
        let mut pixels = frame.pixels().to_vec();

        let mut pending = Vec::with_capacity(4);
        if self.config.contrast_factor != 1.0 {
            pending.push(Stage::Contrast);
        }
        if self.config.sharpening_enabled && !self.config.edge_enhancement {
            pending.push(Stage::Sharpen);
        } else if self.config.sharpening_enabled {
            trace!("edge enhancement enabled, sharpening skipped");
        }
        if self.config.threshold_enabled {
            pending.push(Stage::Threshold);
        }
        if self.config.edge_enhancement {
            pending.push(Stage::EdgeEnhance);
        }

        if self.config.grayscale && format != PixelFormat::Luma8 {
            let stage_start = Instant::now();
            let mut gray = vec![0u8; width * height];
            grayscale_into(&pixels, width, height, format.bytes_per_pixel(), &mut gray);
            pixels = gray;
            format = PixelFormat::Luma8;
            report.applied.push((Stage::Grayscale, stage_start.elapsed()));
        }

        for (i, stage) in pending.iter().copied().enumerate() {
            if started.elapsed() >= budget {
                report.skipped_for_budget.extend_from_slice(&pending[i..]);
                debug!(
                    skipped = report.skipped_for_budget.len(),
                    budget_ms = budget.as_millis() as u64,
                    "preprocessing budget exhausted"
                );
                break;
            }
            let stage_start = Instant::now();
            self.apply(stage, &mut pixels, width, height, format);
            report.applied.push((stage, stage_start.elapsed()));
        }

        report.elapsed = started.elapsed();
        let out = frame.with_pixels(format, pixels)?;
        Ok((out, report))
    }

    fn apply(
        &mut self,
        stage: Stage,
        pixels: &mut Vec<u8>,
        width: usize,
        height: usize,
        format: PixelFormat,
    ) {
        let bpp = format.bytes_per_pixel();
        let channels = format.color_channels();
        match stage {
            Stage::Grayscale => {}
            Stage::Contrast => {
                filters::adjust_contrast(pixels, bpp, channels, self.config.contrast_factor)
            }
            Stage::Sharpen => *pixels = filters::sharpen(pixels, width, height, bpp, channels),
            Stage::Threshold => {
                let gray = filters::luma_of(pixels, width, height, bpp);
                let params = self.config.adaptive_params();
                let (integral, binary) = self.pool.integral_and_scratch(width * height);
                adaptive_threshold_into(&gray, width, height, params, integral, binary);
                for (px, &b) in pixels.chunks_exact_mut(bpp).zip(binary.iter()) {
                    px.iter_mut().take(channels).for_each(|c| *c = b);
                }
            }
            Stage::EdgeEnhance => {
                let marked = filters::enhance_edges(
                    pixels,
                    width,
                    height,
                    bpp,
                    channels,
                    self.config.edge_threshold,
                );
                trace!(marked, "edge pixels marked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_all_off() -> PreprocessConfig {
        PreprocessConfig {
            enabled: true,
            grayscale: false,
            contrast_factor: 1.0,
            sharpening_enabled: false,
            threshold_enabled: false,
            edge_enhancement: false,
            ..PreprocessConfig::default()
        }
    }

    #[test]
    fn empty_frame_is_a_pipeline_error() {
        let mut pre = Preprocessor::new(PreprocessConfig::default());
        let frame = Frame::from_luma(0, 10, Vec::new()).unwrap();
        assert_eq!(pre.process(&frame).unwrap_err(), PipelineError::EmptyFrame);
    }

    #[test]
    fn grayscale_collapses_to_luma_with_same_dimensions() {
        let mut config = config_all_off();
        config.grayscale = true;
        let mut pre = Preprocessor::new(config);
        let frame = Frame::from_rgb(2, 2, vec![255; 12]).unwrap();
        let out = pre.process(&frame).unwrap();
        assert_eq!(out.format(), PixelFormat::Luma8);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.pixels(), &[255, 255, 255, 255]);
        assert_eq!(out.captured_at(), frame.captured_at());
    }

    #[test]
    fn disabled_preprocessing_passes_frame_through() {
        let mut config = PreprocessConfig::default();
        config.enabled = false;
        let mut pre = Preprocessor::new(config);
        let frame = Frame::from_rgb(1, 1, vec![1, 2, 3]).unwrap();
        assert_eq!(pre.process(&frame).unwrap(), frame);
    }

    #[test]
    fn edge_enhancement_replaces_sharpening() {
        let mut config = config_all_off();
        config.sharpening_enabled = true;
        config.edge_enhancement = true;
        let mut pre = Preprocessor::new(config);
        let frame = Frame::from_luma(4, 4, vec![100; 16]).unwrap();
        let (_, report) = pre.process_with_report(&frame).unwrap();
        let stages: Vec<Stage> = report.applied.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, vec![Stage::EdgeEnhance]);
    }

    #[test]
    fn zero_budget_skips_optional_stages() {
        let mut config = config_all_off();
        config.grayscale = true;
        config.contrast_factor = 1.5;
        config.threshold_enabled = true;
        config.budget_ms = 0;
        let mut pre = Preprocessor::new(config);
        let frame = Frame::from_rgb(4, 4, vec![50; 48]).unwrap();
        let (out, report) = pre.process_with_report(&frame).unwrap();
        assert_eq!(out.format(), PixelFormat::Luma8);
        assert_eq!(
            report.skipped_for_budget,
            vec![Stage::Contrast, Stage::Threshold]
        );
    }

    #[test]
    fn threshold_output_is_binary() {
        let mut config = config_all_off();
        config.threshold_enabled = true;
        config.sample_step = 1;
        let mut pre = Preprocessor::new(config);
        let data: Vec<u8> = (0..64u32).map(|i| (i * 4) as u8).collect();
        let frame = Frame::from_luma(8, 8, data).unwrap();
        let out = pre.process(&frame).unwrap();
        assert!(out.pixels().iter().all(|&v| v == 0 || v == 255));
    }
}
