//! rust_qr_live - continuous QR scanning for live camera feeds
//!
//! Frames flow through a fixed pipeline on every tick:
//!
//! 1. [`camera::FrameSource`] hands out the latest camera frame
//! 2. [`preprocess::Preprocessor`] grayscale, contrast, sharpen, threshold, edges
//! 3. [`partition::RegionPartitioner`] center region, full frame, grid cells
//! 4. [`backend::BackendChain`] fast `rqrr` decoder, falling back to `rxing`
//! 5. [`aggregate::ResultAggregator`] dedup and confidence scoring
//!
//! [`controller::ScanController`] drives the loop, owns the
//! [`session::ScanSession`], and adapts the tick interval to how long
//! processing takes.
//!
//! ```no_run
//! use rust_qr_live::camera::{DeviceArbiter, ImageSequenceCamera};
//! use rust_qr_live::{ScanConfig, ScanController};
//!
//! # async fn demo() -> rust_qr_live::Result<()> {
//! let camera = ImageSequenceCamera::from_dir("frames")?;
//! let mut controller =
//!     ScanController::from_config(ScanConfig::default(), Box::new(camera), DeviceArbiter::new());
//! let mut events = controller.subscribe();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//! controller.run().await?;
//! # Ok(())
//! # }
//! ```

/// Merging candidates into session detections
pub mod aggregate;
/// Decode backends and the fallback chain
pub mod backend;
/// Camera devices, acquisition ladder, device exclusivity
pub mod camera;
/// Configuration loading and validation
pub mod config;
/// State machine and tick loop
pub mod controller;
/// Error types
pub mod error;
/// Boundary to the persistence collaborator
pub mod history;
/// Core data structures (Frame, ScanRegion, DetectedCode, ...)
pub mod models;
/// Region partitioning
pub mod partition;
/// Per-tick pipeline glue
pub mod pipeline;
/// Frame preprocessing stages
pub mod preprocess;
/// Scan session state
pub mod session;
/// Dataset and image helpers for the CLI, benches, and tests
pub mod tools;
/// Pixel-level helpers (grayscale, binarization, buffer pool)
pub mod utils;

pub use aggregate::{MergeOutcome, ResultAggregator};
pub use backend::{BackendChain, DecodeBackend};
pub use camera::{CameraDevice, FrameSource};
pub use config::ScanConfig;
pub use controller::{ScanController, ScanEvent, ScanStatus};
pub use error::{CameraError, HistoryError, Result, ScanError};
pub use history::{HistoryRecord, HistorySink, JsonFileHistory};
pub use models::{BackendKind, DetectedCode, DetectionCandidate, Frame, PixelFormat, ScanRegion};
pub use pipeline::ScanPipeline;
pub use session::ScanSession;
