//! Merging per-tick candidates into session detections
//!
//! Scoring: `raw x size_factor x jump_penalty + consistency_bonus`, clamped to
//! [0, 1].
//!
//! - `size_factor` is `min(1, min_side / min_code_side)` when the backend
//!   reported a location, 1 otherwise.
//! - `jump_penalty` applies when the payload's center moved more than
//!   `max_jump_fraction` of the frame diagonal since it was last seen.
//! - `consistency_bonus` applies when the payload was seen on the previous
//!   tick.
//!
//! Every observation is remembered, accepted or not, so a payload that keeps
//! showing up can cross the threshold later.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::config::AggregationConfig;
use crate::models::{DetectedCode, DetectionCandidate, Point};
use crate::session::ScanSession;

/// Observations older than this many ticks are forgotten
const HISTORY_TICKS: u64 = 30;

/// Result of merging one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Codes promoted this tick, in promotion order
    pub new_codes: Vec<DetectedCode>,
    /// Payloads already in the session that were seen again
    pub duplicates: Vec<String>,
    /// Payloads that scored below the threshold, with their score
    pub rejected: Vec<(String, f32)>,
}

impl MergeOutcome {
    /// Whether anything passed the threshold or was a repeat
    pub fn has_observations(&self) -> bool {
        !self.new_codes.is_empty() || !self.duplicates.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Sighting {
    tick: u64,
    center: Option<Point>,
}

/// Deduplicates and scores candidates against a session
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    config: AggregationConfig,
    threshold: f32,
    tick: u64,
    seen: HashMap<String, Sighting>,
}

impl ResultAggregator {
    pub fn new(config: AggregationConfig, threshold: f32) -> Self {
        Self {
            config,
            threshold,
            tick: 0,
            seen: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Forget temporal history
    pub fn reset(&mut self) {
        self.tick = 0;
        self.seen.clear();
    }

    /// Count a tick that ended without candidates to merge
    ///
    /// Aborted ticks and ticks without a frame still break a run of
    /// consecutive sightings.
    pub fn skip_tick(&mut self) {
        self.tick += 1;
    }

    /// Score a candidate as it would be scored on the next merge
    pub fn score(&self, candidate: &DetectionCandidate, frame_size: (usize, usize)) -> f32 {
        let mut score = candidate.raw_confidence;

        if let Some(location) = &candidate.location {
            if self.config.min_code_side > 0.0 {
                score *= (location.min_side() / self.config.min_code_side).min(1.0);
            }
        }

        if let Some(previous) = self.seen.get(&candidate.payload) {
            let diagonal = (frame_size.0 as f32).hypot(frame_size.1 as f32);
            let center = candidate.location.as_ref().map(|q| q.center());
            let jumped = match (previous.center, center) {
                (Some(before), Some(now)) => {
                    before.distance(&now) > self.config.max_jump_fraction * diagonal
                }
                _ => false,
            };
            if jumped {
                score *= self.config.jump_penalty;
            }
            if previous.tick == self.tick {
                score += self.config.consistency_bonus;
            }
        }

        score.clamp(0.0, 1.0)
    }

    /// Merge one tick's candidates into `session`
    ///
    /// Must be called once per completed tick, with an empty slice when the
    /// tick found nothing, so "seen on the previous tick" stays accurate.
    /// Ticks that never reach a merge go through [`ResultAggregator::skip_tick`].
    pub fn merge(
        &mut self,
        candidates: &[DetectionCandidate],
        frame_size: (usize, usize),
        observed_at: DateTime<Utc>,
        session: &mut ScanSession,
    ) -> MergeOutcome {
        let mut scored: Vec<(f32, &DetectionCandidate)> = candidates
            .iter()
            .map(|c| (self.score(c, frame_size), c))
            .collect();
        // stable: equal scores keep region order
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.region.priority.cmp(&b.1.region.priority))
        });

        let mut outcome = MergeOutcome::default();
        let mut handled: HashSet<&str> = HashSet::new();
        for (score, candidate) in &scored {
            if !handled.insert(candidate.payload.as_str()) {
                continue;
            }
            if session.contains(&candidate.payload) {
                session.observe(observed_at);
                outcome.duplicates.push(candidate.payload.clone());
            } else if *score >= self.threshold {
                if let Some(code) =
                    session.promote(&candidate.payload, *score, candidate.backend, observed_at)
                {
                    session.observe(observed_at);
                    debug!(
                        payload = %code.payload,
                        sequence = code.sequence,
                        confidence = *score,
                        backend = %candidate.backend,
                        "code detected"
                    );
                    outcome.new_codes.push(code);
                }
            } else {
                trace!(payload = %candidate.payload, score, "candidate below threshold");
                outcome.rejected.push((candidate.payload.clone(), *score));
            }
        }

        self.tick += 1;
        // best-scoring candidate per payload is the reference for jump checks
        let mut recorded: HashSet<&str> = HashSet::new();
        for (_, candidate) in &scored {
            if !recorded.insert(candidate.payload.as_str()) {
                continue;
            }
            self.seen.insert(
                candidate.payload.clone(),
                Sighting {
                    tick: self.tick,
                    center: candidate.location.as_ref().map(|q| q.center()),
                },
            );
        }
        let horizon = self.tick.saturating_sub(HISTORY_TICKS);
        self.seen.retain(|_, s| s.tick > horizon);

        outcome
    }
}
