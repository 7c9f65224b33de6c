//! One tick's worth of work: preprocess, partition, decode
//!
//! [`ScanPipeline`] owns no session state, so a controller can move it onto a
//! blocking worker for the duration of a tick and take it back afterwards.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::backend::BackendChain;
use crate::config::ScanConfig;
use crate::error::PipelineError;
use crate::models::{DetectionCandidate, Frame, LumaPlane};
use crate::partition::RegionPartitioner;
use crate::preprocess::{PreprocessReport, Preprocessor};

/// Where the time of one tick went
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickTelemetry {
    pub preprocess: PreprocessReport,
    pub partition: Duration,
    pub decode: Duration,
    /// Regions produced by the partitioner
    pub regions: usize,
    /// Regions actually offered to the backends
    pub regions_scanned: usize,
    pub backend_failures: usize,
    pub total: Duration,
}

/// Raw output of one tick, ready for aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct TickCandidates {
    pub candidates: Vec<DetectionCandidate>,
    /// (width, height) of the frame
    pub frame_size: (usize, usize),
    pub captured_at: DateTime<Utc>,
    pub telemetry: TickTelemetry,
}

/// Preprocessor, partitioner and backend chain wired together
#[derive(Debug)]
pub struct ScanPipeline {
    preprocessor: Preprocessor,
    partitioner: RegionPartitioner,
    chain: BackendChain,
    stop_on_first_hit: bool,
}

impl ScanPipeline {
    pub fn new(
        preprocessor: Preprocessor,
        partitioner: RegionPartitioner,
        chain: BackendChain,
        stop_on_first_hit: bool,
    ) -> Self {
        Self {
            preprocessor,
            partitioner,
            chain,
            stop_on_first_hit,
        }
    }

    /// Pipeline with the built-in backends selected by `config`
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::with_backends(config, BackendChain::from_selection(&config.backends))
    }

    /// Pipeline from `config` with a caller-supplied backend chain
    pub fn with_backends(config: &ScanConfig, chain: BackendChain) -> Self {
        Self::new(
            Preprocessor::new(config.preprocessing.clone()),
            RegionPartitioner::new(config.partition.clone()),
            chain,
            config.stop_on_first_hit,
        )
    }

    pub fn chain(&self) -> &BackendChain {
        &self.chain
    }

    pub fn partitioner(&self) -> &RegionPartitioner {
        &self.partitioner
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Run every stage on `frame`
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub fn run(&mut self, frame: &Frame) -> Result<TickCandidates, PipelineError> {
        let started = Instant::now();
        if frame.is_empty() {
            return Err(PipelineError::EmptyFrame);
        }
        let mut telemetry = TickTelemetry::default();

        let (processed, report) = self.preprocessor.process_with_report(frame)?;
        telemetry.preprocess = report;

        let stage = Instant::now();
        let regions = self.partitioner.partition(&processed);
        telemetry.partition = stage.elapsed();
        telemetry.regions = regions.len();

        let stage = Instant::now();
        let plane = LumaPlane::new(&processed.luma(), processed.width(), processed.height());
        let outcome = self
            .chain
            .decode_regions(&plane, &regions, self.stop_on_first_hit);
        telemetry.decode = stage.elapsed();
        telemetry.regions_scanned = outcome.regions_scanned;
        telemetry.backend_failures = outcome.backend_failures;
        telemetry.total = started.elapsed();

        debug!(
            candidates = outcome.candidates.len(),
            regions_scanned = outcome.regions_scanned,
            total_ms = telemetry.total.as_millis() as u64,
            "tick decoded"
        );

        Ok(TickCandidates {
            candidates: outcome.candidates,
            frame_size: (frame.width(), frame.height()),
            captured_at: frame.captured_at(),
            telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DecodeBackend, Decoded};
    use crate::error::DecodeError;
    use crate::models::BackendKind;

    struct DarkPixelCounter;

    impl DecodeBackend for DarkPixelCounter {
        fn name(&self) -> &'static str {
            "dark"
        }
        fn kind(&self) -> BackendKind {
            BackendKind::FastSingle
        }
        fn decode(&self, image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
            if image.data.iter().any(|&v| v < 64) {
                Ok(vec![Decoded {
                    payload: "dark".into(),
                    confidence: 1.0,
                    location: None,
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn pipeline(stop_on_first_hit: bool) -> ScanPipeline {
        let config = ScanConfig {
            stop_on_first_hit,
            ..ScanConfig::default()
        };
        ScanPipeline::with_backends(&config, BackendChain::new().with_backend(DarkPixelCounter))
    }

    #[test]
    fn empty_frame_aborts_the_tick() {
        let frame = Frame::from_luma(0, 0, Vec::new()).unwrap();
        assert_eq!(pipeline(true).run(&frame).unwrap_err(), PipelineError::EmptyFrame);
    }

    #[test]
    fn off_center_mark_is_found_in_grid_cell() {
        let (w, h) = (300, 300);
        let mut data = vec![255u8; w * h];
        // dark blob in the top-left cell only
        for y in 10..30 {
            for x in 10..30 {
                data[y * w + x] = 0;
            }
        }
        let frame = Frame::from_luma(w, h, data).unwrap();
        let tick = pipeline(false).run(&frame).unwrap();
        // full frame plus the top-left cell
        assert_eq!(tick.candidates.len(), 2);
        assert_eq!(tick.telemetry.regions, 11);
        assert_eq!(tick.telemetry.regions_scanned, 11);
        assert_eq!(tick.frame_size, (300, 300));
        assert_eq!(tick.captured_at, frame.captured_at());
    }

    #[test]
    fn first_hit_stops_after_full_frame() {
        let (w, h) = (300, 300);
        let mut data = vec![255u8; w * h];
        data[5 * w + 5] = 0;
        let frame = Frame::from_luma(w, h, data).unwrap();
        let tick = pipeline(true).run(&frame).unwrap();
        assert_eq!(tick.candidates.len(), 1);
        assert_eq!(tick.candidates[0].region.priority, 1);
        assert_eq!(tick.telemetry.regions_scanned, 2);
    }
}
