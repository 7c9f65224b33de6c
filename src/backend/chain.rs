//! Per-region fallback across decode backends

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::trace;

use super::{DecodeBackend, Decoded, RqrrBackend, RxingBackend};
use crate::config::BackendSelection;
use crate::error::DecodeError;
use crate::models::{BackendKind, DetectionCandidate, LumaPlane, ScanRegion};

/// Candidates gathered from one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainOutcome {
    /// Candidates in region order, locations in frame coordinates
    pub candidates: Vec<DetectionCandidate>,
    /// Regions that were offered to at least one backend
    pub regions_scanned: usize,
    /// Backend calls that failed or panicked
    pub backend_failures: usize,
}

/// Ordered set of backends
///
/// For every region the fast backends run first, in insertion order. Robust
/// backends only see a region when no fast backend produced anything for it.
#[derive(Default)]
pub struct BackendChain {
    fast: Vec<Box<dyn DecodeBackend>>,
    robust: Vec<Box<dyn DecodeBackend>>,
}

impl BackendChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the built-in backends enabled in `selection`
    pub fn from_selection(selection: &BackendSelection) -> Self {
        let mut chain = Self::new();
        if selection.fast {
            chain = chain.with_backend(RqrrBackend::new());
        }
        if selection.robust {
            chain = chain.with_backend(RxingBackend::new());
        }
        chain
    }

    pub fn with_backend(mut self, backend: impl DecodeBackend + 'static) -> Self {
        self.push(Box::new(backend));
        self
    }

    pub fn push(&mut self, backend: Box<dyn DecodeBackend>) {
        match backend.kind() {
            BackendKind::FastSingle => self.fast.push(backend),
            BackendKind::RobustMulti => self.robust.push(backend),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty() && self.robust.is_empty()
    }

    /// Backend names in invocation order
    pub fn names(&self) -> Vec<&'static str> {
        self.fast
            .iter()
            .chain(self.robust.iter())
            .map(|b| b.name())
            .collect()
    }

    /// Decode one region of `plane`, falling back from fast to robust
    ///
    /// Returns the candidates of the first backend with a non-empty answer and
    /// the number of failed calls.
    pub fn decode_region(
        &self,
        plane: &LumaPlane,
        region: &ScanRegion,
    ) -> (Vec<DetectionCandidate>, usize) {
        let crop = match plane.crop(region) {
            Ok(crop) => crop,
            Err(err) => {
                trace!(error = %err, "region skipped");
                return (Vec::new(), 0);
            }
        };

        let mut failures = 0;
        for backend in self.fast.iter().chain(self.robust.iter()) {
            match invoke(backend.as_ref(), &crop) {
                Ok(found) if !found.is_empty() => {
                    let candidates = found
                        .into_iter()
                        .map(|d| to_candidate(d, backend.as_ref(), region))
                        .collect();
                    return (candidates, failures);
                }
                Ok(_) => {
                    trace!(backend = backend.name(), priority = region.priority, "no symbol")
                }
                Err(err) => {
                    failures += 1;
                    trace!(backend = backend.name(), priority = region.priority, error = %err, "decode failed");
                }
            }
        }
        (Vec::new(), failures)
    }

    /// Offer `regions` in order; with `stop_on_first_hit` iteration ends at
    /// the first region that produced candidates
    pub fn decode_regions(
        &self,
        plane: &LumaPlane,
        regions: &[ScanRegion],
        stop_on_first_hit: bool,
    ) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        for region in regions {
            let (candidates, failures) = self.decode_region(plane, region);
            outcome.regions_scanned += 1;
            outcome.backend_failures += failures;
            let hit = !candidates.is_empty();
            outcome.candidates.extend(candidates);
            if hit && stop_on_first_hit {
                break;
            }
        }
        outcome
    }
}

impl std::fmt::Debug for BackendChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendChain")
            .field("backends", &self.names())
            .finish()
    }
}

fn invoke(backend: &dyn DecodeBackend, image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
    catch_unwind(AssertUnwindSafe(|| backend.decode(image))).unwrap_or(Err(
        DecodeError::Panicked {
            backend: backend.name(),
        },
    ))
}

fn to_candidate(
    decoded: Decoded,
    backend: &dyn DecodeBackend,
    region: &ScanRegion,
) -> DetectionCandidate {
    let (dx, dy) = (region.rect.x as f32, region.rect.y as f32);
    DetectionCandidate {
        payload: decoded.payload,
        region: *region,
        backend: backend.kind(),
        backend_name: backend.name(),
        raw_confidence: decoded.confidence.clamp(0.0, 1.0),
        location: decoded.location.map(|q| q.translate(dx, dy)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::{Point, Quad, Rect};

    struct Scripted {
        name: &'static str,
        kind: BackendKind,
        answer: Result<Vec<&'static str>, ()>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(name: &'static str, kind: BackendKind, answer: Result<Vec<&'static str>, ()>) -> Self {
            Self {
                name,
                kind,
                answer,
                calls: Mutex::new(0),
            }
        }
    }

    impl DecodeBackend for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
        fn kind(&self) -> BackendKind {
            self.kind
        }
        fn decode(&self, _image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
            *self.calls.lock().unwrap() += 1;
            match &self.answer {
                Ok(payloads) => Ok(payloads
                    .iter()
                    .map(|p| Decoded {
                        payload: p.to_string(),
                        confidence: 1.0,
                        location: Quad::from_points(vec![Point::new(1.0, 1.0), Point::new(5.0, 5.0)]),
                    })
                    .collect()),
                Err(()) => Err(DecodeError::Backend {
                    backend: self.name,
                    message: "bad region".to_string(),
                }),
            }
        }
    }

    struct Panicking;

    impl DecodeBackend for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn kind(&self) -> BackendKind {
            BackendKind::FastSingle
        }
        fn decode(&self, _image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
            panic!("decoder bug")
        }
    }

    fn plane() -> LumaPlane {
        LumaPlane::new(&[128u8; 100 * 100], 100, 100)
    }

    fn regions() -> Vec<ScanRegion> {
        vec![
            ScanRegion::new(Rect::new(25, 25, 50, 50), 0),
            ScanRegion::new(Rect::new(0, 0, 100, 100), 1),
        ]
    }

    #[test]
    fn robust_runs_only_when_fast_is_empty() {
        let chain = BackendChain::new()
            .with_backend(Scripted::new("robust", BackendKind::RobustMulti, Ok(vec!["R"])))
            .with_backend(Scripted::new("fast", BackendKind::FastSingle, Ok(vec!["F"])));
        assert_eq!(chain.names(), vec!["fast", "robust"]);
        let (found, failures) = chain.decode_region(&plane(), &regions()[0]);
        assert_eq!(failures, 0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload, "F");
        assert_eq!(found[0].backend, BackendKind::FastSingle);
    }

    #[test]
    fn failing_fast_backend_falls_back_to_robust() {
        let chain = BackendChain::new()
            .with_backend(Scripted::new("fast", BackendKind::FastSingle, Err(())))
            .with_backend(Scripted::new("robust", BackendKind::RobustMulti, Ok(vec!["Z9"])));
        let outcome = chain.decode_regions(&plane(), &regions(), true);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].payload, "Z9");
        assert_eq!(outcome.candidates[0].backend_name, "robust");
        assert_eq!(outcome.backend_failures, 1);
    }

    #[test]
    fn panicking_backend_counts_as_failure() {
        let chain = BackendChain::new()
            .with_backend(Panicking)
            .with_backend(Scripted::new("robust", BackendKind::RobustMulti, Ok(vec![])));
        let outcome = chain.decode_regions(&plane(), &regions(), false);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.regions_scanned, 2);
        assert_eq!(outcome.backend_failures, 2);
    }

    #[test]
    fn first_hit_stops_region_iteration() {
        let chain = BackendChain::new()
            .with_backend(Scripted::new("fast", BackendKind::FastSingle, Ok(vec!["A"])));
        let first = chain.decode_regions(&plane(), &regions(), true);
        assert_eq!(first.regions_scanned, 1);
        let all = chain.decode_regions(&plane(), &regions(), false);
        assert_eq!(all.regions_scanned, 2);
        assert_eq!(all.candidates.len(), 2);
    }

    #[test]
    fn locations_are_translated_to_frame_coordinates() {
        let chain = BackendChain::new()
            .with_backend(Scripted::new("fast", BackendKind::FastSingle, Ok(vec!["A"])));
        let (found, _) = chain.decode_region(&plane(), &regions()[0]);
        let quad = found[0].location.clone().unwrap();
        assert_eq!(quad.points[0], Point::new(26.0, 26.0));
        assert_eq!(found[0].region.priority, 0);
    }

    #[test]
    fn out_of_bounds_region_is_skipped() {
        let backend = Scripted::new("fast", BackendKind::FastSingle, Ok(vec!["A"]));
        let chain = BackendChain::new().with_backend(backend);
        let region = ScanRegion::new(Rect::new(90, 90, 20, 20), 0);
        let (found, failures) = chain.decode_region(&plane(), &region);
        assert!(found.is_empty());
        assert_eq!(failures, 0);
    }
}
