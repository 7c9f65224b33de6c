//! Scanner configuration.
//!
//! Loaded from JSON (camelCase keys, every field optional), then adjusted by
//! `QR_SCAN_*` environment variables and validated.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::Facing;
use crate::error::ConfigError;
use crate::utils::binarization::AdaptiveParams;

/// Preprocessing stage toggles and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessConfig {
    /// Master switch; when false frames go to the backends untouched
    pub enabled: bool,
    /// Collapse colour frames to luminance
    pub grayscale: bool,
    /// Contrast gain around mid-gray; 1.0 disables the stage
    pub contrast_factor: f32,
    pub sharpening_enabled: bool,
    pub threshold_enabled: bool,
    /// Neighbourhood side for the adaptive threshold mean
    pub region_size: usize,
    /// Subtracted from the neighbourhood mean
    pub threshold_constant: i32,
    /// Block side sharing one threshold (1 = per-pixel)
    pub sample_step: usize,
    pub edge_enhancement: bool,
    /// Gradient magnitude above which a pixel is marked as edge
    pub edge_threshold: u16,
    /// Time budget per frame; remaining optional stages are skipped once spent
    pub budget_ms: u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grayscale: true,
            contrast_factor: 1.3,
            sharpening_enabled: true,
            threshold_enabled: false,
            region_size: 15,
            threshold_constant: 10,
            sample_step: 2,
            edge_enhancement: false,
            edge_threshold: 96,
            budget_ms: 40,
        }
    }
}

impl PreprocessConfig {
    pub fn adaptive_params(&self) -> AdaptiveParams {
        AdaptiveParams {
            region_size: self.region_size,
            constant: self.threshold_constant,
            sample_step: self.sample_step,
        }
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// Region partitioning policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartitionConfig {
    /// Side of the centered sub-rectangle relative to the frame
    pub center_fraction: f32,
    /// N for the N x N coverage grid; 1 disables the grid
    pub grid_size: usize,
    pub include_full_frame: bool,
    /// Regions smaller than this on either side are not emitted
    pub min_region_side: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            center_fraction: 0.5,
            grid_size: 3,
            include_full_frame: true,
            min_region_side: 32,
        }
    }
}

/// Which decode backends are built into the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendSelection {
    pub fast: bool,
    pub robust: bool,
}

impl Default for BackendSelection {
    fn default() -> Self {
        Self {
            fast: true,
            robust: true,
        }
    }
}

/// Confidence scoring knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregationConfig {
    /// Bounding boxes with a shorter side than this are downweighted
    pub min_code_side: f32,
    /// Center movement (fraction of frame diagonal) counted as a jump
    pub max_jump_fraction: f32,
    /// Added when the payload was also seen on the previous tick
    pub consistency_bonus: f32,
    /// Multiplier applied after a jump
    pub jump_penalty: f32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_code_side: 21.0,
            max_jump_fraction: 0.25,
            consistency_bonus: 0.15,
            jump_penalty: 0.5,
        }
    }
}

/// Preferred camera constraints and acquisition timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
    /// Exact device to open; tried before the generic ladder levels
    pub device_id: Option<String>,
    /// Pause between two ladder attempts
    pub settle_delay_ms: u64,
    /// Pause after releasing a previous holder before opening
    pub release_wait_ms: u64,
    /// Upper bound for a single open attempt
    pub attempt_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            width: 1280,
            height: 720,
            device_id: None,
            settle_delay_ms: 300,
            release_wait_ms: 500,
            attempt_timeout_ms: 3000,
        }
    }
}

/// Complete scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub preprocessing: PreprocessConfig,
    pub partition: PartitionConfig,
    pub backends: BackendSelection,
    pub aggregation: AggregationConfig,
    pub camera: CameraConfig,
    /// Minimum confidence for promotion (inclusive)
    pub confidence_threshold: f32,
    pub min_tick_interval_ms: u64,
    pub max_tick_interval_ms: u64,
    pub initial_tick_interval_ms: u64,
    /// Minimum time between two feedback cues
    pub debounce_ms: u64,
    /// Stop region iteration at the first region that yields a candidate
    pub stop_on_first_hit: bool,
    /// Stop the session once this many distinct codes were collected
    pub stop_after_detections: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preprocessing: PreprocessConfig::default(),
            partition: PartitionConfig::default(),
            backends: BackendSelection::default(),
            aggregation: AggregationConfig::default(),
            camera: CameraConfig::default(),
            confidence_threshold: 0.5,
            min_tick_interval_ms: 100,
            max_tick_interval_ms: 1000,
            initial_tick_interval_ms: 200,
            debounce_ms: 250,
            stop_on_first_hit: true,
            stop_after_detections: None,
        }
    }
}

fn parse_env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_env_f32(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: f32) -> f32 {
    lookup(name)
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn parse_env_bool_u8(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name)
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

impl ScanConfig {
    /// Parse a JSON document; missing keys keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Apply `QR_SCAN_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `QR_SCAN_*` overrides resolved through `lookup`
    pub fn apply_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        self.confidence_threshold = parse_env_f32(
            &lookup,
            "QR_SCAN_CONFIDENCE_THRESHOLD",
            self.confidence_threshold,
        );
        self.min_tick_interval_ms =
            parse_env_u64(&lookup, "QR_SCAN_MIN_TICK_MS", self.min_tick_interval_ms);
        self.max_tick_interval_ms =
            parse_env_u64(&lookup, "QR_SCAN_MAX_TICK_MS", self.max_tick_interval_ms);
        self.debounce_ms = parse_env_u64(&lookup, "QR_SCAN_DEBOUNCE_MS", self.debounce_ms);
        self.stop_on_first_hit =
            parse_env_bool_u8(&lookup, "QR_SCAN_STOP_ON_FIRST_HIT", self.stop_on_first_hit);
        self.preprocessing.enabled =
            parse_env_bool_u8(&lookup, "QR_SCAN_PREPROCESS", self.preprocessing.enabled);
        self.preprocessing.budget_ms =
            parse_env_u64(&lookup, "QR_SCAN_PREPROCESS_BUDGET_MS", self.preprocessing.budget_ms);
        self.backends.fast = parse_env_bool_u8(&lookup, "QR_SCAN_FAST_BACKEND", self.backends.fast);
        self.backends.robust =
            parse_env_bool_u8(&lookup, "QR_SCAN_ROBUST_BACKEND", self.backends.robust);
        if let Some(device) = lookup("QR_SCAN_DEVICE").filter(|v| !v.trim().is_empty()) {
            self.camera.device_id = Some(device.trim().to_string());
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values the scanner cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidenceThreshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.min_tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "minTickIntervalMs must be positive".to_string(),
            ));
        }
        if self.min_tick_interval_ms > self.max_tick_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "minTickIntervalMs ({}) exceeds maxTickIntervalMs ({})",
                self.min_tick_interval_ms, self.max_tick_interval_ms
            )));
        }
        if self.preprocessing.contrast_factor <= 0.0 {
            return Err(ConfigError::Invalid(
                "contrastFactor must be positive".to_string(),
            ));
        }
        if self.preprocessing.region_size == 0 || self.preprocessing.sample_step == 0 {
            return Err(ConfigError::Invalid(
                "regionSize and sampleStep must be positive".to_string(),
            ));
        }
        if self.partition.grid_size == 0 {
            return Err(ConfigError::Invalid("gridSize must be positive".to_string()));
        }
        if !(self.partition.center_fraction > 0.0 && self.partition.center_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "centerFraction must be within (0, 1], got {}",
                self.partition.center_fraction
            )));
        }
        if !self.backends.fast && !self.backends.robust {
            return Err(ConfigError::Invalid(
                "at least one decode backend must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_tick_interval(&self) -> Duration {
        Duration::from_millis(self.min_tick_interval_ms)
    }

    pub fn max_tick_interval(&self) -> Duration {
        Duration::from_millis(self.max_tick_interval_ms)
    }

    pub fn initial_tick_interval(&self) -> Duration {
        Duration::from_millis(self.initial_tick_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
