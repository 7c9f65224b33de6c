//! The set of codes collected by one continuous scanning run

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::history::HistoryRecord;
use crate::models::{BackendKind, DetectedCode};

/// Detected codes of one run plus its timing state
///
/// Payloads are unique: [`ScanSession::promote`] refuses a payload that is
/// already present.
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    codes: Vec<DetectedCode>,
    payloads: HashSet<String>,
    next_sequence: u64,
    interval: Duration,
    last_detection: Option<DateTime<Utc>>,
}

impl ScanSession {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            codes: Vec::new(),
            payloads: HashSet::new(),
            next_sequence: 1,
            interval: initial_interval,
            last_detection: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Codes in detection order
    pub fn codes(&self) -> &[DetectedCode] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.payloads.contains(payload)
    }

    pub fn get(&self, id: Uuid) -> Option<&DetectedCode> {
        self.codes.iter().find(|c| c.id == id)
    }

    /// Record a new payload; `None` if it is already present
    pub fn promote(
        &mut self,
        payload: &str,
        confidence: f32,
        backend: BackendKind,
        detected_at: DateTime<Utc>,
    ) -> Option<DetectedCode> {
        if !self.payloads.insert(payload.to_string()) {
            return None;
        }
        let code = DetectedCode {
            id: Uuid::new_v4(),
            payload: payload.to_string(),
            first_detected: detected_at,
            sequence: self.next_sequence,
            confidence,
            backend,
        };
        self.next_sequence += 1;
        self.codes.push(code.clone());
        Some(code)
    }

    /// Drop a single code by id
    pub fn remove(&mut self, id: Uuid) -> Option<DetectedCode> {
        let index = self.codes.iter().position(|c| c.id == id)?;
        let code = self.codes.remove(index);
        self.payloads.remove(&code.payload);
        Some(code)
    }

    /// Empty the code set; numbering restarts at 1
    pub fn clear(&mut self) {
        self.codes.clear();
        self.payloads.clear();
        self.next_sequence = 1;
    }

    /// Note an observation of any payload, new or repeated
    pub fn observe(&mut self, at: DateTime<Utc>) {
        if self.last_detection.is_none_or(|last| at > last) {
            self.last_detection = Some(at);
        }
    }

    pub fn last_detection(&self) -> Option<DateTime<Utc>> {
        self.last_detection
    }

    /// Current tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn to_history_records(&self) -> Vec<HistoryRecord> {
        self.codes.iter().map(HistoryRecord::from).collect()
    }
}
